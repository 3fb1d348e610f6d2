use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_where::validate_field;

/// Mongo-style field projection: an inclusion map (`{"title": 1}`) or an
/// exclusion map (`{"content": 0}`). Mixing both modes is rejected. The `id`
/// field rides along with inclusion projections unless excluded by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    pub fn parse(projection: &Value) -> Result<Projection, FilterError> {
        let obj = match projection {
            Value::Null => return Ok(Projection::All),
            Value::Object(obj) if obj.is_empty() => return Ok(Projection::All),
            Value::Object(obj) => obj,
            _ => {
                return Err(FilterError::InvalidProjection(
                    "projection must be a JSON object".to_string(),
                ))
            }
        };

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for (field, flag) in obj {
            validate_field(field)?;
            match flag {
                Value::Number(n) if n.as_i64() == Some(1) => include.push(field.clone()),
                Value::Number(n) if n.as_i64() == Some(0) => exclude.push(field.clone()),
                Value::Bool(true) => include.push(field.clone()),
                Value::Bool(false) => exclude.push(field.clone()),
                other => {
                    return Err(FilterError::InvalidProjection(format!(
                        "projection values must be 0/1 or booleans, got {}",
                        other
                    )))
                }
            }
        }

        match (include.is_empty(), exclude.is_empty()) {
            (false, false) => Err(FilterError::InvalidProjection(
                "cannot mix inclusion and exclusion in one projection".to_string(),
            )),
            (false, true) => Ok(Projection::Include(include)),
            (true, false) => Ok(Projection::Exclude(exclude)),
            (true, true) => Ok(Projection::All),
        }
    }

    pub fn apply(&self, fields: &Map<String, Value>) -> Map<String, Value> {
        match self {
            Projection::All => fields.clone(),
            Projection::Include(keep) => {
                let mut out = Map::new();
                if let Some(id) = fields.get("id") {
                    out.insert("id".to_string(), id.clone());
                }
                for key in keep {
                    if let Some(v) = fields.get(key) {
                        out.insert(key.clone(), v.clone());
                    }
                }
                out
            }
            Projection::Exclude(drop) => {
                let mut out = fields.clone();
                for key in drop {
                    out.remove(key);
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Map<String, Value> {
        json!({ "id": 1, "title": "t", "content": "c", "views": 3 })
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn include_keeps_id() {
        let p = Projection::parse(&json!({ "title": 1 })).unwrap();
        let out = p.apply(&fields());
        assert_eq!(out.len(), 2);
        assert!(out.contains_key("id"));
        assert!(out.contains_key("title"));
    }

    #[test]
    fn exclude_drops_listed() {
        let p = Projection::parse(&json!({ "content": 0, "id": 0 })).unwrap();
        let out = p.apply(&fields());
        assert!(!out.contains_key("content"));
        assert!(!out.contains_key("id"));
        assert!(out.contains_key("views"));
    }

    #[test]
    fn empty_is_all() {
        assert_eq!(Projection::parse(&json!({})).unwrap(), Projection::All);
        assert_eq!(Projection::parse(&Value::Null).unwrap(), Projection::All);
    }

    #[test]
    fn mixed_modes_rejected() {
        assert!(Projection::parse(&json!({ "a": 1, "b": 0 })).is_err());
        assert!(Projection::parse(&json!({ "a": "yes" })).is_err());
        assert!(Projection::parse(&json!([1])).is_err());
    }
}
