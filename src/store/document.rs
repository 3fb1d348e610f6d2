use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Fields stamped by the repository layer. API input may not set them.
pub const SYSTEM_FIELDS: &[&str] = &["id", "createdAt", "updatedAt"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(String),

    #[error("Invalid document: {0}")]
    InvalidJson(String),
}

/// Document identifier. Sequentially allocated ids are numeric; opaque string
/// ids from imported data remain addressable. Route parameters disambiguate
/// by attempting the numeric parse first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocId {
    Int(i64),
    Str(String),
}

impl DocId {
    pub fn parse(raw: &str) -> DocId {
        match raw.trim().parse::<i64>() {
            Ok(n) => DocId::Int(n),
            Err(_) => DocId::Str(raw.to_string()),
        }
    }

    pub fn from_value(value: &Value) -> Option<DocId> {
        match value {
            Value::Number(n) => n.as_i64().map(DocId::Int),
            Value::String(s) => Some(DocId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DocId::Int(n) => Value::from(*n),
            DocId::Str(s) => Value::from(s.clone()),
        }
    }

    /// Canonical string form used as the store's primary key.
    pub fn as_key(&self) -> String {
        match self {
            DocId::Int(n) => n.to_string(),
            DocId::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

impl Serialize for DocId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DocId::Int(n) => serializer.serialize_i64(*n),
            DocId::Str(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for DocId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        DocId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("expected a numeric or string id"))
    }
}

/// A record in a collection: an arbitrary field map plus the guarded system
/// fields. Field names are camelCase on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self { fields: Map::new() }
    }

    /// Build a document from API input, rejecting system fields.
    pub fn from_api_input(json: Value) -> Result<Self, DocumentError> {
        match json {
            Value::Object(map) => {
                for key in map.keys() {
                    if SYSTEM_FIELDS.contains(&key.as_str()) {
                        return Err(DocumentError::SystemFieldNotAllowed(key.clone()));
                    }
                }
                Ok(Self { fields: map })
            }
            _ => Err(DocumentError::InvalidJson("expected a JSON object".to_string())),
        }
    }

    /// Build a batch from a JSON array, labelling which item failed.
    pub fn from_api_array(json: Value) -> Result<Vec<Self>, DocumentError> {
        match json {
            Value::Array(items) => {
                let mut docs = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let doc = Self::from_api_input(item).map_err(|e| {
                        DocumentError::InvalidJson(format!("item {}: {}", index + 1, e))
                    })?;
                    docs.push(doc);
                }
                Ok(docs)
            }
            _ => Err(DocumentError::InvalidJson("expected a JSON array".to_string())),
        }
    }

    /// Build from trusted store data (system fields allowed).
    pub fn from_value(json: Value) -> Self {
        match json {
            Value::Object(map) => Self { fields: map },
            _ => Self::new(),
        }
    }

    /// Sanitize a partial-update map: same system-field policy as input.
    pub fn sanitize_update(json: Value) -> Result<Map<String, Value>, DocumentError> {
        match json {
            Value::Object(map) => {
                for key in map.keys() {
                    if SYSTEM_FIELDS.contains(&key.as_str()) {
                        return Err(DocumentError::SystemFieldNotAllowed(key.clone()));
                    }
                }
                Ok(map)
            }
            _ => Err(DocumentError::InvalidJson("expected a JSON object".to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    /// Set an application field; system fields are ignored here.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            tracing::warn!(field = %key, "attempted to set system field, ignoring");
            return self;
        }
        self.fields.insert(key, value.into());
        self
    }

    /// Set a field only if it is currently absent or null.
    pub fn set_if_empty(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        let key = key.into();
        match self.fields.get(&key) {
            None | Some(Value::Null) => {
                self.fields.insert(key, value);
            }
            Some(_) => {}
        }
        self
    }

    pub fn set_system(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn merge(&mut self, changes: &Map<String, Value>) -> &mut Self {
        for (key, value) in changes {
            self.fields.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn id(&self) -> Option<DocId> {
        self.get("id").and_then(DocId::from_value)
    }

    pub fn set_id(&mut self, id: &DocId) -> &mut Self {
        self.set_system("id", id.to_value())
    }

    /// Stamp creation and update timestamps.
    pub fn stamp_created(&mut self, now: DateTime<Utc>) -> &mut Self {
        let ts = Value::String(now.to_rfc3339());
        self.set_system("createdAt", ts.clone());
        self.set_system("updatedAt", ts);
        self
    }

    pub fn stamp_updated(&mut self, now: DateTime<Utc>) -> &mut Self {
        self.set_system("updatedAt", Value::String(now.to_rfc3339()))
    }

    pub fn created_at(&self) -> Option<&Value> {
        self.get("createdAt")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        Value::Object(doc.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_system_fields_from_api_input() {
        let err = Document::from_api_input(json!({ "id": 7, "title": "x" })).unwrap_err();
        assert!(matches!(err, DocumentError::SystemFieldNotAllowed(f) if f == "id"));

        let err = Document::from_api_input(json!({ "createdAt": "now" })).unwrap_err();
        assert!(matches!(err, DocumentError::SystemFieldNotAllowed(_)));

        assert!(Document::from_api_input(json!([1, 2])).is_err());
    }

    #[test]
    fn from_api_array_labels_bad_item() {
        let err = Document::from_api_array(json!([{ "title": "ok" }, { "id": 1 }])).unwrap_err();
        assert!(err.to_string().contains("item 2"));
    }

    #[test]
    fn id_parse_prefers_numeric() {
        assert_eq!(DocId::parse("42"), DocId::Int(42));
        assert_eq!(DocId::parse("66b2f0a1"), DocId::Str("66b2f0a1".to_string()));
        assert_eq!(DocId::parse("42").as_key(), "42");
    }

    #[test]
    fn numeric_ids_sort_before_string_ids() {
        let mut ids = vec![
            DocId::Str("abc".to_string()),
            DocId::Int(10),
            DocId::Int(2),
        ];
        ids.sort();
        assert_eq!(ids, vec![DocId::Int(2), DocId::Int(10), DocId::Str("abc".to_string())]);
    }

    #[test]
    fn stamping_sets_both_timestamps_on_create() {
        let mut doc = Document::from_api_input(json!({ "title": "x" })).unwrap();
        let now = Utc::now();
        doc.stamp_created(now);
        assert_eq!(doc.get_str("createdAt"), doc.get_str("updatedAt"));
        assert!(doc.get_str("createdAt").is_some());
    }

    #[test]
    fn set_ignores_system_fields() {
        let mut doc = Document::new();
        doc.set("id", 99);
        assert!(doc.id().is_none());
        doc.set_system("id", 99);
        assert_eq!(doc.id(), Some(DocId::Int(99)));
    }
}
