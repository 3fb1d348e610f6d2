use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::filter::filter_order::FilterOrder;
use crate::filter::WhereNode;

use super::document::{DocId, Document};
use super::{DocumentStore, StoreError, StoreQuery, UpdateOutcome};

/// In-memory document store. Backs the test suite and dependency-free local
/// runs; state does not survive the process.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<DocId, Document>>>,
    counters: RwLock<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching_keys(
        docs: &BTreeMap<DocId, Document>,
        filter: Option<&WhereNode>,
        many: bool,
    ) -> Vec<DocId> {
        let mut keys = Vec::new();
        for (key, doc) in docs {
            if filter.map(|f| f.matches(doc.fields())).unwrap_or(true) {
                keys.push(key.clone());
                if !many {
                    break;
                }
            }
        }
        keys
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|d| query.filter.as_ref().map(|f| f.matches(d.fields())).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !query.order.is_empty() {
            docs.sort_by(|a, b| FilterOrder::compare(&query.order, a.fields(), b.fields()));
        }

        let skip = query.skip.unwrap_or(0).max(0) as usize;
        let docs = docs.into_iter().skip(skip);
        Ok(match query.limit {
            Some(limit) if limit >= 0 => docs.take(limit as usize).collect(),
            _ => docs.collect(),
        })
    }

    async fn count(&self, collection: &str, filter: Option<&WhereNode>) -> Result<i64, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|d| filter.map(|f| f.matches(d.fields())).unwrap_or(true))
                    .count() as i64
            })
            .unwrap_or(0))
    }

    async fn insert(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();

        // Validate the whole batch before touching anything: no partial inserts.
        let mut ids = Vec::with_capacity(docs.len());
        for doc in &docs {
            let id = doc
                .id()
                .ok_or_else(|| StoreError::Invalid("document is missing an id".to_string()))?;
            if coll.contains_key(&id) || ids.contains(&id) {
                return Err(StoreError::Conflict(format!("duplicate id: {}", id)));
            }
            ids.push(id);
        }

        for (id, doc) in ids.into_iter().zip(docs) {
            coll.insert(id, doc);
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        changes: &Map<String, Value>,
        many: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(UpdateOutcome::default());
        };

        let keys = Self::matching_keys(coll, filter, many);
        let mut outcome = UpdateOutcome::default();
        for key in keys {
            if let Some(doc) = coll.get_mut(&key) {
                outcome.matched += 1;
                let before = doc.fields().clone();
                doc.merge(changes);
                if doc.fields() != &before {
                    outcome.modified += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn replace(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        doc: Document,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let keys = Self::matching_keys(coll, filter, false);
        match keys.into_iter().next() {
            Some(key) => {
                coll.insert(key, doc);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(
        &self,
        collection: &str,
        filter: Option<&WhereNode>,
        many: bool,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let keys = Self::matching_keys(coll, filter, many);
        let mut deleted = 0;
        for key in keys {
            if coll.remove(&key).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn allocate_ids(&self, collection: &str, count: i64) -> Result<i64, StoreError> {
        if count < 1 {
            return Err(StoreError::Invalid("id block size must be positive".to_string()));
        }
        let mut counters = self.counters.write().await;
        let next = counters.entry(collection.to_string()).or_insert(0);
        let first = *next + 1;
        *next += count;
        Ok(first)
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
        let needle = text.to_lowercase();
        let collections = self.collections.read().await;
        let docs = collections
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|d| filter.map(|f| f.matches(d.fields())).unwrap_or(true))
                    .filter(|d| {
                        fields.iter().any(|field| {
                            d.get_str(field)
                                .map(|s| s.to_lowercase().contains(&needle))
                                .unwrap_or(false)
                        })
                    })
                    .cloned()
                    .skip(skip.max(0) as usize)
                    .take(if limit >= 0 { limit as usize } else { usize::MAX })
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterData, WhereNode};
    use serde_json::json;

    fn doc(v: Value) -> Document {
        Document::from_value(v)
    }

    fn filter(v: Value) -> WhereNode {
        WhereNode::parse(&v).unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(
                "articles",
                vec![
                    doc(json!({ "id": 1, "title": "Rust basics", "content": "ownership", "views": 10 })),
                    doc(json!({ "id": 2, "title": "Async io", "content": "rust futures", "views": 50 })),
                    doc(json!({ "id": 3, "title": "Cooking", "content": "pasta", "views": 5 })),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = seeded().await;
        let err = store
            .insert("articles", vec![doc(json!({ "id": 2, "title": "dup" }))])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        // Nothing partial happened.
        assert_eq!(store.count("articles", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn find_applies_filter_order_and_pagination() {
        let store = seeded().await;
        let data = FilterData {
            sort: Some(json!({ "views": "desc" })),
            ..Default::default()
        };
        let query = StoreQuery {
            filter: Some(filter(json!({ "views": { "$gte": 5 } }))),
            order: crate::filter::filter_order::FilterOrder::parse(data.sort.as_ref().unwrap()).unwrap(),
            limit: Some(2),
            skip: Some(1),
        };
        let docs = store.find("articles", &query).await.unwrap();
        let views: Vec<i64> = docs.iter().map(|d| d.get_i64("views").unwrap()).collect();
        assert_eq!(views, vec![10, 5]);
    }

    #[tokio::test]
    async fn update_one_touches_only_first_match() {
        let store = seeded().await;
        let changes = json!({ "category": "Tech" }).as_object().unwrap().clone();
        let outcome = store
            .update("articles", Some(&filter(json!({ "views": { "$gt": 0 } }))), &changes, false)
            .await
            .unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.modified, 1);
        assert_eq!(
            store
                .count("articles", Some(&filter(json!({ "category": "Tech" }))))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn update_many_reports_unmodified_rows() {
        let store = seeded().await;
        let changes = json!({ "views": 10 }).as_object().unwrap().clone();
        let outcome = store
            .update("articles", Some(&filter(json!({ "id": { "$in": [1, 2] } }))), &changes, true)
            .await
            .unwrap();
        assert_eq!(outcome.matched, 2);
        // id 1 already had views=10.
        assert_eq!(outcome.modified, 1);
    }

    #[tokio::test]
    async fn delete_one_then_many() {
        let store = seeded().await;
        let deleted = store
            .delete("articles", Some(&filter(json!({ "views": { "$gt": 0 } }))), false)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        let deleted = store.delete("articles", None, true).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count("articles", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn allocates_contiguous_blocks() {
        let store = MemoryStore::new();
        let first = store.allocate_ids("articles", 3).await.unwrap();
        assert_eq!(first, 1);
        let next = store.allocate_ids("articles", 2).await.unwrap();
        assert_eq!(next, 4);
        // Independent per collection.
        assert_eq!(store.allocate_ids("users", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_over_fields() {
        let store = seeded().await;
        let found = store
            .search("articles", &["title", "content"], "RUST", None, 20, 0)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        let found = store
            .search("articles", &["title"], "rust", None, 20, 0)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn replace_swaps_whole_document() {
        let store = seeded().await;
        let replacement = doc(json!({ "id": 1, "title": "Rewritten", "views": 0 }));
        let matched = store
            .replace("articles", Some(&filter(json!({ "id": 1 }))), replacement)
            .await
            .unwrap();
        assert_eq!(matched, 1);
        let query = StoreQuery {
            filter: Some(filter(json!({ "id": 1 }))),
            ..Default::default()
        };
        let docs = store.find("articles", &query).await.unwrap();
        assert_eq!(docs[0].get_str("title"), Some("Rewritten"));
        assert!(docs[0].get("content").is_none());
    }
}
