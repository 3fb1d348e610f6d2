use std::collections::BTreeMap;
use std::marker::PhantomData;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config;
use crate::filter::filter_order::FilterOrder;
use crate::filter::filter_where::validate_field;
use crate::filter::{FilterData, OrderSpec, Projection, SortDirection, WhereNode};
use crate::store::{DocId, Document, StoreError, StoreHandle, StoreQuery};

/// Per-collection configuration for the generic repository: name, default
/// listing order, search surface and the field defaults stamped on writes.
pub trait Collection: Send + Sync + 'static {
    const NAME: &'static str;
    const SEARCH_FIELDS: &'static [&'static str];
    /// Numeric fields summarized by `aggregate` when stats are requested.
    const STAT_FIELDS: &'static [&'static str];

    fn default_order() -> Vec<OrderSpec>;
    fn apply_create_defaults(doc: &mut Document);
    fn apply_replace_defaults(doc: &mut Document, existing: &Document);
}

pub struct Users;

impl Collection for Users {
    const NAME: &'static str = "users";
    const SEARCH_FIELDS: &'static [&'static str] = &["username", "email", "firstName", "lastName"];
    const STAT_FIELDS: &'static [&'static str] = &[];

    fn default_order() -> Vec<OrderSpec> {
        vec![]
    }

    fn apply_create_defaults(doc: &mut Document) {
        doc.set_if_empty("isActive", Value::Bool(true));
        doc.set_if_empty("role", Value::from("user"));
    }

    fn apply_replace_defaults(doc: &mut Document, _existing: &Document) {
        doc.set_if_empty("isActive", Value::Bool(true));
        doc.set_if_empty("role", Value::from("user"));
    }
}

pub struct Articles;

impl Collection for Articles {
    const NAME: &'static str = "articles";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "content"];
    const STAT_FIELDS: &'static [&'static str] = &["views", "likes"];

    fn default_order() -> Vec<OrderSpec> {
        vec![OrderSpec {
            field: "createdAt".to_string(),
            sort: SortDirection::Desc,
        }]
    }

    fn apply_create_defaults(doc: &mut Document) {
        doc.set_if_empty("isPublished", Value::Bool(true));
        doc.set_if_empty("views", Value::from(0));
        doc.set_if_empty("likes", Value::from(0));
        doc.set_if_empty("tags", Value::Array(vec![]));
        doc.set_if_empty("category", Value::from("General"));
    }

    fn apply_replace_defaults(doc: &mut Document, existing: &Document) {
        doc.set_if_empty("isPublished", Value::Bool(true));
        doc.set_if_empty("views", Value::from(existing.get_i64("views").unwrap_or(0)));
        doc.set_if_empty("likes", Value::from(existing.get_i64("likes").unwrap_or(0)));
        doc.set_if_empty("tags", Value::Array(vec![]));
        doc.set_if_empty("category", Value::from("General"));
    }
}

// Result envelopes, serialized with the wire's camelCase field names.

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub success: bool,
    pub inserted_id: Value,
    pub record: Document,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManyResult {
    pub success: bool,
    pub inserted_count: usize,
    pub records: Vec<Document>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOneResult {
    pub success: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Document>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManyResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOneResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Document>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOneResult {
    pub success: bool,
    pub deleted_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_record: Option<Document>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteManyResult {
    pub deleted_count: u64,
    pub deleted_records: Vec<Document>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindResult {
    pub records: Vec<Document>,
    pub count: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub records: Vec<Document>,
    pub count: usize,
}

/// Generic document repository, instantiated per collection. Owns timestamp
/// stamping, id assignment and result shaping; delegates storage to the
/// injected store handle.
pub struct Repository<C: Collection> {
    store: StoreHandle,
    _collection: PhantomData<C>,
}

impl<C: Collection> Clone for Repository<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _collection: PhantomData,
        }
    }
}

impl<C: Collection> Repository<C> {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            _collection: PhantomData,
        }
    }

    fn id_filter(id: &DocId) -> WhereNode {
        WhereNode::eq("id", id.to_value())
    }

    fn parse_filter(filter: &Value) -> Result<Option<WhereNode>, StoreError> {
        if filter.is_null() {
            return Ok(None);
        }
        Ok(Some(WhereNode::parse(filter)?))
    }

    /// Cap a requested limit at the configured maximum; 0 means unlimited.
    fn effective_limit(requested: Option<i64>) -> Option<i64> {
        let mut limit = requested.filter(|l| *l > 0);
        if let Some(max) = config::config().filter.max_limit {
            match limit {
                Some(l) if l > max => {
                    if config::config().filter.debug_logging {
                        tracing::warn!("limit {} exceeds max {}, capping", l, max);
                    }
                    limit = Some(max);
                }
                _ => {}
            }
        }
        limit
    }

    pub async fn get_all(&self) -> Result<Vec<Document>, StoreError> {
        let query = StoreQuery {
            order: C::default_order(),
            ..Default::default()
        };
        self.store.find(C::NAME, &query).await
    }

    pub async fn get_by_id(&self, id: &DocId) -> Result<Option<Document>, StoreError> {
        let query = StoreQuery {
            filter: Some(Self::id_filter(id)),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.store.find(C::NAME, &query).await?.into_iter().next())
    }

    pub async fn create(&self, mut doc: Document) -> Result<bool, StoreError> {
        let first = self.store.allocate_ids(C::NAME, 1).await?;
        doc.set_id(&DocId::Int(first));
        doc.stamp_created(Utc::now());
        C::apply_create_defaults(&mut doc);
        self.store.insert(C::NAME, vec![doc]).await?;
        Ok(true)
    }

    /// Partial update by id ($set semantics over the listed fields only).
    pub async fn update(&self, id: &DocId, mut changes: Map<String, Value>) -> Result<bool, StoreError> {
        changes.insert("updatedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        let outcome = self
            .store
            .update(C::NAME, Some(&Self::id_filter(id)), &changes, false)
            .await?;
        Ok(outcome.matched > 0)
    }

    pub async fn delete(&self, id: &DocId) -> Result<bool, StoreError> {
        let deleted = self
            .store
            .delete(C::NAME, Some(&Self::id_filter(id)), false)
            .await?;
        Ok(deleted > 0)
    }

    pub async fn exists(&self, id: &DocId) -> Result<bool, StoreError> {
        let count = self.store.count(C::NAME, Some(&Self::id_filter(id))).await?;
        Ok(count > 0)
    }

    pub async fn insert_one(&self, mut doc: Document) -> Result<InsertOneResult, StoreError> {
        let first = self.store.allocate_ids(C::NAME, 1).await?;
        let id = DocId::Int(first);
        doc.set_id(&id);
        doc.stamp_created(Utc::now());
        C::apply_create_defaults(&mut doc);
        self.store.insert(C::NAME, vec![doc.clone()]).await?;
        Ok(InsertOneResult {
            success: true,
            inserted_id: id.to_value(),
            record: doc,
        })
    }

    /// Ids for the whole batch come from one allocator call, so they are
    /// contiguous even under concurrent inserts.
    pub async fn insert_many(&self, docs: Vec<Document>) -> Result<InsertManyResult, StoreError> {
        if docs.is_empty() {
            return Err(StoreError::Invalid("expected a non-empty array".to_string()));
        }
        let first = self.store.allocate_ids(C::NAME, docs.len() as i64).await?;
        let now = Utc::now();

        let mut prepared = Vec::with_capacity(docs.len());
        for (offset, mut doc) in docs.into_iter().enumerate() {
            doc.set_id(&DocId::Int(first + offset as i64));
            doc.stamp_created(now);
            C::apply_create_defaults(&mut doc);
            prepared.push(doc);
        }

        self.store.insert(C::NAME, prepared.clone()).await?;
        Ok(InsertManyResult {
            success: true,
            inserted_count: prepared.len(),
            records: prepared,
        })
    }

    pub async fn update_one_by_filter(
        &self,
        filter: &Value,
        mut changes: Map<String, Value>,
    ) -> Result<UpdateOneResult, StoreError> {
        let node = Self::parse_filter(filter)?;
        changes.insert("updatedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        let outcome = self.store.update(C::NAME, node.as_ref(), &changes, false).await?;

        if outcome.matched == 0 {
            return Ok(UpdateOneResult {
                success: false,
                matched_count: 0,
                modified_count: 0,
                record: None,
            });
        }

        // Re-read by the same filter to report the updated record.
        let query = StoreQuery {
            filter: node,
            limit: Some(1),
            ..Default::default()
        };
        let record = self.store.find(C::NAME, &query).await?.into_iter().next();
        Ok(UpdateOneResult {
            success: true,
            matched_count: outcome.matched,
            modified_count: outcome.modified,
            record,
        })
    }

    /// Zero matches is not an error for the many-variant.
    pub async fn update_many_by_filter(
        &self,
        filter: &Value,
        mut changes: Map<String, Value>,
    ) -> Result<UpdateManyResult, StoreError> {
        let node = Self::parse_filter(filter)?;
        changes.insert("updatedAt".to_string(), Value::String(Utc::now().to_rfc3339()));
        let outcome = self.store.update(C::NAME, node.as_ref(), &changes, true).await?;
        Ok(UpdateManyResult {
            matched_count: outcome.matched,
            modified_count: outcome.modified,
        })
    }

    /// Full replacement of all fields except the preserved id and creation
    /// timestamp.
    pub async fn replace_one_by_filter(
        &self,
        filter: &Value,
        replacement: Document,
    ) -> Result<ReplaceOneResult, StoreError> {
        let node = Self::parse_filter(filter)?;
        let query = StoreQuery {
            filter: node.clone(),
            limit: Some(1),
            ..Default::default()
        };
        let Some(existing) = self.store.find(C::NAME, &query).await?.into_iter().next() else {
            return Ok(ReplaceOneResult {
                success: false,
                record: None,
            });
        };

        let mut doc = replacement;
        if let Some(id) = existing.id() {
            doc.set_id(&id);
        }
        if let Some(created) = existing.created_at() {
            doc.set_system("createdAt", created.clone());
        }
        doc.stamp_updated(Utc::now());
        C::apply_replace_defaults(&mut doc, &existing);

        let matched = self.store.replace(C::NAME, node.as_ref(), doc.clone()).await?;
        Ok(ReplaceOneResult {
            success: matched > 0,
            record: (matched > 0).then_some(doc),
        })
    }

    /// Fetch-before-delete so the deleted content can be reported. The set
    /// deleted may differ from the set read if a concurrent writer intervenes;
    /// accepted as best-effort reporting.
    pub async fn delete_one_by_filter(&self, filter: &Value) -> Result<DeleteOneResult, StoreError> {
        let node = Self::parse_filter(filter)?;
        let query = StoreQuery {
            filter: node.clone(),
            limit: Some(1),
            ..Default::default()
        };
        let Some(target) = self.store.find(C::NAME, &query).await?.into_iter().next() else {
            return Ok(DeleteOneResult {
                success: false,
                deleted_count: 0,
                deleted_record: None,
            });
        };

        let deleted = self.store.delete(C::NAME, node.as_ref(), false).await?;
        Ok(DeleteOneResult {
            success: deleted > 0,
            deleted_count: deleted,
            deleted_record: (deleted > 0).then_some(target),
        })
    }

    pub async fn delete_many_by_filter(&self, filter: &Value) -> Result<DeleteManyResult, StoreError> {
        let node = Self::parse_filter(filter)?;
        let query = StoreQuery {
            filter: node.clone(),
            ..Default::default()
        };
        let targets = self.store.find(C::NAME, &query).await?;
        if targets.is_empty() {
            return Ok(DeleteManyResult {
                deleted_count: 0,
                deleted_records: vec![],
            });
        }

        let deleted = self.store.delete(C::NAME, node.as_ref(), true).await?;
        Ok(DeleteManyResult {
            deleted_count: deleted,
            deleted_records: targets,
        })
    }

    pub async fn find_with_projection(
        &self,
        filter: &Value,
        projection: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let node = Self::parse_filter(filter)?;
        let proj = Projection::parse(projection)?;
        let query = StoreQuery {
            filter: node,
            ..Default::default()
        };
        let docs = self.store.find(C::NAME, &query).await?;
        Ok(docs
            .into_iter()
            .map(|d| Document::from_value(Value::Object(proj.apply(d.fields()))))
            .collect())
    }

    pub async fn find_by_filter(&self, data: &FilterData) -> Result<FindResult, StoreError> {
        let node = data.filter.as_ref().map(WhereNode::parse).transpose()?;
        let proj = data
            .projection
            .as_ref()
            .map(Projection::parse)
            .transpose()?
            .unwrap_or(Projection::All);
        let order = data
            .sort
            .as_ref()
            .map(FilterOrder::parse)
            .transpose()?
            .unwrap_or_default();

        let limit = Self::effective_limit(data.limit);
        let skip = data.skip.filter(|s| *s > 0);

        let total = self.store.count(C::NAME, node.as_ref()).await?;
        let query = StoreQuery {
            filter: node,
            order,
            limit,
            skip,
        };
        let docs = self.store.find(C::NAME, &query).await?;

        let has_more = match limit {
            Some(l) => total > skip.unwrap_or(0) + l,
            None => false,
        };
        let records: Vec<Document> = docs
            .into_iter()
            .map(|d| Document::from_value(Value::Object(proj.apply(d.fields()))))
            .collect();
        Ok(FindResult {
            count: records.len(),
            records,
            has_more,
        })
    }

    /// Free-text search over the collection's search surface.
    pub async fn search(
        &self,
        text: &str,
        filter: Option<WhereNode>,
        limit: i64,
        skip: i64,
        projection: &Value,
    ) -> Result<SearchResult, StoreError> {
        let proj = Projection::parse(projection)?;
        let limit = Self::effective_limit(Some(limit)).unwrap_or(20);
        let docs = self
            .store
            .search(C::NAME, C::SEARCH_FIELDS, text, filter.as_ref(), limit, skip.max(0))
            .await?;
        let records: Vec<Document> = docs
            .into_iter()
            .map(|d| Document::from_value(Value::Object(proj.apply(d.fields()))))
            .collect();
        Ok(SearchResult {
            count: records.len(),
            records,
        })
    }

    /// Group records by an arbitrary field; optionally summarize the
    /// collection's stat fields per group.
    pub async fn aggregate(&self, group_by: &str, include_stats: bool) -> Result<Value, StoreError> {
        validate_field(group_by).map_err(StoreError::Query)?;
        let docs = self.store.find(C::NAME, &StoreQuery::default()).await?;

        let mut groups: BTreeMap<String, Vec<&Document>> = BTreeMap::new();
        for doc in &docs {
            let key = match doc.get(group_by) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => "unknown".to_string(),
                Some(other) => other.to_string(),
            };
            groups.entry(key).or_default().push(doc);
        }

        let groups: Vec<Value> = groups
            .into_iter()
            .map(|(key, members)| {
                let mut entry = json!({
                    "group": key,
                    "count": members.len(),
                });
                if include_stats {
                    let mut stats = Map::new();
                    for field in C::STAT_FIELDS {
                        let total: i64 = members.iter().map(|d| d.get_i64(field).unwrap_or(0)).sum();
                        let avg = total as f64 / members.len() as f64;
                        stats.insert(format!("total_{}", field), Value::from(total));
                        stats.insert(format!("avg_{}", field), Value::from(avg));
                    }
                    entry["stats"] = Value::Object(stats);
                }
                entry
            })
            .collect();

        Ok(json!({
            "groupBy": group_by,
            "totalGroups": groups.len(),
            "groups": groups,
        }))
    }
}

impl Repository<Articles> {
    /// Article reads count as a view, as in the original system. The counter
    /// bump is a follow-up single-row update, not transactional with the read.
    pub async fn get_by_id_counting_view(&self, id: &DocId) -> Result<Option<Document>, StoreError> {
        let Some(mut doc) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let views = doc.get_i64("views").unwrap_or(0) + 1;
        let mut changes = Map::new();
        changes.insert("views".to_string(), Value::from(views));
        self.store
            .update(Articles::NAME, Some(&Self::id_filter(id)), &changes, false)
            .await?;
        doc.set("views", views);
        Ok(Some(doc))
    }

    pub async fn top(
        &self,
        sort_by: &str,
        limit: i64,
        published_only: bool,
    ) -> Result<Vec<Document>, StoreError> {
        validate_field(sort_by).map_err(StoreError::Query)?;
        let query = StoreQuery {
            filter: published_only.then(|| WhereNode::eq("isPublished", true)),
            order: vec![OrderSpec {
                field: sort_by.to_string(),
                sort: SortDirection::Desc,
            }],
            limit: Self::effective_limit(Some(limit)),
            skip: None,
        };
        self.store.find(Articles::NAME, &query).await
    }
}

impl Repository<Users> {
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Document>, StoreError> {
        let query = StoreQuery {
            filter: Some(WhereNode::eq("email", email)),
            limit: Some(1),
            ..Default::default()
        };
        Ok(self.store.find(Users::NAME, &query).await?.into_iter().next())
    }

    pub async fn statistics(&self) -> Result<Value, StoreError> {
        let docs = self.store.find(Users::NAME, &StoreQuery::default()).await?;
        let total = docs.len();
        let active = docs
            .iter()
            .filter(|d| d.get("isActive").and_then(|v| v.as_bool()).unwrap_or(false))
            .count();

        let mut roles: BTreeMap<String, usize> = BTreeMap::new();
        for doc in &docs {
            let role = doc.get_str("role").unwrap_or("unknown").to_string();
            *roles.entry(role).or_default() += 1;
        }

        Ok(json!({
            "totalUsers": total,
            "activeUsers": active,
            "roleStats": roles,
        }))
    }
}
