use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Composite query options accepted by the find endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    pub filter: Option<Value>,
    pub projection: Option<Value>,
    pub sort: Option<Value>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// Comparison operators supported in filter conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NIn,
    Like,
    ILike,
    Exists,
}

/// Parsed filter tree. Both store backends consume this: the Postgres store
/// compiles it to parameterized SQL, the memory store evaluates it directly.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    And(Vec<WhereNode>),
    Or(Vec<WhereNode>),
    Not(Box<WhereNode>),
    Cond {
        field: String,
        op: FilterOp,
        value: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub field: String,
    pub sort: SortDirection,
}

/// Bind parameter emitted during SQL generation. Scalar comparisons bind the
/// raw JSON value as jsonb; LIKE patterns and field names bind as text.
#[derive(Debug, Clone)]
pub enum SqlParam {
    Jsonb(Value),
    Text(String),
}
