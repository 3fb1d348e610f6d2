use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{PgPool, Row};

use crate::filter::filter_order::FilterOrder;
use crate::filter::filter_where::validate_field;
use crate::filter::{SqlParam, WhereNode};

use super::document::Document;
use super::{validate_collection, DocumentStore, StoreError, StoreQuery, UpdateOutcome};

/// Postgres-backed document store. Each collection is a
/// `(id TEXT PRIMARY KEY, doc JSONB)` table; filters compile to parameterized
/// SQL over JSONB accessors, and sequential ids come from an atomic counter
/// table so concurrent inserts cannot collide.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self { pool };
        store.ensure_counters().await?;
        Ok(store)
    }

    /// Shared pool, used by the Postgres session store.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        let table = table_name(collection)?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (id TEXT PRIMARY KEY, doc JSONB NOT NULL)",
            table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_counters(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS doc_counters (collection TEXT PRIMARY KEY, next_id BIGINT NOT NULL)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn table_name(collection: &str) -> Result<String, StoreError> {
    validate_collection(collection)?;
    Ok(format!("docs_{}", collection))
}

fn where_sql(filter: Option<&WhereNode>, params: &mut Vec<SqlParam>) -> Result<String, StoreError> {
    match filter {
        Some(node) => Ok(node.to_sql(params)?),
        None => Ok("TRUE".to_string()),
    }
}

fn bind_all<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    let mut q = query;
    for p in params {
        q = match p {
            SqlParam::Jsonb(v) => q.bind(v),
            SqlParam::Text(s) => q.bind(s),
        };
    }
    q
}

fn map_insert_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db) = e {
        // SQLSTATE 23505: unique_violation
        if db.code().as_deref() == Some("23505") {
            return StoreError::Conflict("duplicate document id".to_string());
        }
    }
    StoreError::Sqlx(e)
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn find(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        let table = table_name(collection)?;
        let mut params = Vec::new();
        let where_clause = where_sql(query.filter.as_ref(), &mut params)?;
        let order_clause = FilterOrder::to_sql(&query.order)?;

        let mut sql = format!("SELECT doc FROM \"{}\" WHERE {}", table, where_clause);
        if !order_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&order_clause);
        }
        if let Some(limit) = query.limit {
            if limit >= 0 {
                sql.push_str(&format!(" LIMIT {}", limit));
            }
        }
        if let Some(skip) = query.skip {
            if skip > 0 {
                sql.push_str(&format!(" OFFSET {}", skip));
            }
        }

        let rows = bind_all(sqlx::query(&sql), &params).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| Ok(Document::from_value(row.try_get::<Value, _>("doc")?)))
            .collect()
    }

    async fn count(&self, collection: &str, filter: Option<&WhereNode>) -> Result<i64, StoreError> {
        let table = table_name(collection)?;
        let mut params = Vec::new();
        let where_clause = where_sql(filter, &mut params)?;
        let sql = format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", table, where_clause);

        let row = bind_all(sqlx::query(&sql), &params).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    async fn insert(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError> {
        if docs.is_empty() {
            return Ok(());
        }
        let table = table_name(collection)?;
        let sql = format!("INSERT INTO \"{}\" (id, doc) VALUES ($1, $2)", table);

        let mut tx = self.pool.begin().await?;
        for doc in docs {
            let id = doc
                .id()
                .ok_or_else(|| StoreError::Invalid("document is missing an id".to_string()))?;
            sqlx::query(&sql)
                .bind(id.as_key())
                .bind(doc.to_value())
                .execute(&mut *tx)
                .await
                .map_err(map_insert_err)?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        changes: &Map<String, Value>,
        many: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let table = table_name(collection)?;
        let mut params = vec![SqlParam::Jsonb(Value::Object(changes.clone()))];
        let where_clause = where_sql(filter, &mut params)?;

        let sql = if many {
            format!("UPDATE \"{}\" SET doc = doc || $1 WHERE {}", table, where_clause)
        } else {
            format!(
                "UPDATE \"{t}\" SET doc = doc || $1 WHERE id = (SELECT id FROM \"{t}\" WHERE {w} LIMIT 1)",
                t = table,
                w = where_clause
            )
        };

        let result = bind_all(sqlx::query(&sql), &params).execute(&self.pool).await?;
        let affected = result.rows_affected();
        // Row-rewrite semantics: every matched row counts as modified. The
        // change set always carries a fresh updatedAt, so this matches what a
        // modified-count-aware store would report anyway.
        Ok(UpdateOutcome { matched: affected, modified: affected })
    }

    async fn replace(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        doc: Document,
    ) -> Result<u64, StoreError> {
        let table = table_name(collection)?;
        let mut params = vec![SqlParam::Jsonb(doc.to_value())];
        let where_clause = where_sql(filter, &mut params)?;

        let sql = format!(
            "UPDATE \"{t}\" SET doc = $1 WHERE id = (SELECT id FROM \"{t}\" WHERE {w} LIMIT 1)",
            t = table,
            w = where_clause
        );
        let result = bind_all(sqlx::query(&sql), &params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        many: bool,
    ) -> Result<u64, StoreError> {
        let table = table_name(collection)?;
        let mut params = Vec::new();
        let where_clause = where_sql(filter, &mut params)?;

        let sql = if many {
            format!("DELETE FROM \"{}\" WHERE {}", table, where_clause)
        } else {
            format!(
                "DELETE FROM \"{t}\" WHERE id = (SELECT id FROM \"{t}\" WHERE {w} LIMIT 1)",
                t = table,
                w = where_clause
            )
        };
        let result = bind_all(sqlx::query(&sql), &params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn allocate_ids(&self, collection: &str, count: i64) -> Result<i64, StoreError> {
        if count < 1 {
            return Err(StoreError::Invalid("id block size must be positive".to_string()));
        }
        validate_collection(collection)?;

        let row = sqlx::query(
            "INSERT INTO doc_counters (collection, next_id) VALUES ($1, $2) \
             ON CONFLICT (collection) DO UPDATE SET next_id = doc_counters.next_id + $2 \
             RETURNING next_id",
        )
        .bind(collection)
        .bind(count)
        .fetch_one(&self.pool)
        .await?;

        let next: i64 = row.try_get("next_id")?;
        Ok(next - count + 1)
    }

    async fn search(
        &self,
        collection: &str,
        fields: &[&str],
        text: &str,
        filter: Option<&WhereNode>,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Document>, StoreError> {
        let table = table_name(collection)?;
        let mut accessors = Vec::with_capacity(fields.len());
        for field in fields {
            validate_field(field)?;
            accessors.push(format!("coalesce(doc->>'{}','')", field));
        }
        let tsv = format!("to_tsvector('english', {})", accessors.join(" || ' ' || "));

        let mut params = vec![SqlParam::Text(text.to_string())];
        let where_clause = where_sql(filter, &mut params)?;

        let sql = format!(
            "SELECT doc FROM \"{table}\" \
             WHERE {tsv} @@ plainto_tsquery('english', $1) AND {where_clause} \
             ORDER BY ts_rank({tsv}, plainto_tsquery('english', $1)) DESC \
             LIMIT {limit} OFFSET {skip}",
            limit = limit.max(0),
            skip = skip.max(0),
        );

        let rows = bind_all(sqlx::query(&sql), &params).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| Ok(Document::from_value(row.try_get::<Value, _>("doc")?)))
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_validated() {
        assert_eq!(table_name("articles").unwrap(), "docs_articles");
        assert!(table_name("articles; DROP TABLE x").is_err());
        assert!(table_name("").is_err());
    }
}
