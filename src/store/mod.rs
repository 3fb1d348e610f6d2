pub mod document;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::{FilterError, OrderSpec, WhereNode};

pub use document::{DocId, Document, DocumentError, SYSTEM_FIELDS};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Errors from the store layer. Callers surface these as 500s (503 when the
/// backend is unreachable) after logging; details never reach clients.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid document: {0}")]
    Invalid(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query rejected: {0}")]
    Query(#[from] FilterError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Query shape handed to a store backend: parsed filter, order, pagination.
#[derive(Debug, Clone, Default)]
pub struct StoreQuery {
    pub filter: Option<WhereNode>,
    pub order: Vec<OrderSpec>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// The document store seam. Implementations are black-box CRUD/query engines;
/// everything above this trait is store-agnostic.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: Option<&WhereNode>) -> Result<i64, StoreError>;

    /// Insert fully-formed documents (ids already assigned). A store-level
    /// uniqueness violation surfaces as `Conflict`; bulk inserts are atomic.
    async fn insert(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError>;

    /// Merge `changes` into matching documents ($set semantics). With
    /// `many = false` only the first match is touched.
    async fn update(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        changes: &Map<String, Value>,
        many: bool,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Replace the first matching document wholesale. Returns matched count.
    async fn replace(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        doc: Document,
    ) -> Result<u64, StoreError>;

    /// Delete matching documents, first match only unless `many`.
    async fn delete(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        many: bool,
    ) -> Result<u64, StoreError>;

    /// Atomically allocate a contiguous block of `count` sequential ids,
    /// returning the first id of the block.
    async fn allocate_ids(&self, collection: &str, count: i64) -> Result<i64, StoreError>;

    /// Free-text search across the given fields, optionally restricted by a
    /// filter. Ranking is backend-defined.
    async fn search(
        &self,
        collection: &str,
        fields: &[&str],
        text: &str,
        filter: Option<&WhereNode>,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Document>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub type StoreHandle = Arc<dyn DocumentStore>;

/// Collection names are interpolated into table names; same identifier rule
/// as filter fields.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    crate::filter::filter_where::validate_field(name).map_err(StoreError::Query)
}
