use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid filter: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
