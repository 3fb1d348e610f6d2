use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_where::{cmp_json, validate_field};
use super::types::{OrderSpec, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse a sort specification. Accepts `{ "createdAt": "desc" }` /
    /// `{ "views": -1 }` objects, `"createdAt desc"` strings, or arrays of
    /// such strings.
    pub fn parse(sort: &Value) -> Result<Vec<OrderSpec>, FilterError> {
        match sort {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        _ => {
                            return Err(FilterError::InvalidSort(
                                "sort array entries must be strings".to_string(),
                            ))
                        }
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (field, dir) in obj {
                    validate_field(field)?;
                    let sort = match dir {
                        Value::String(s) if s.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                        Value::String(s) if s.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                        Value::Number(n) if n.as_i64() == Some(-1) => SortDirection::Desc,
                        Value::Number(n) if n.as_i64() == Some(1) => SortDirection::Asc,
                        other => {
                            return Err(FilterError::InvalidSort(format!(
                                "sort direction must be asc/desc or 1/-1, got {}",
                                other
                            )))
                        }
                    };
                    out.push(OrderSpec { field: field.clone(), sort });
                }
                Ok(out)
            }
            _ => Err(FilterError::InvalidSort(
                "sort must be an object, string or array".to_string(),
            )),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<OrderSpec>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            let field = it.next().unwrap().to_string();
            validate_field(&field)?;
            let dir = it.next().unwrap_or("asc");
            let sort = if dir.eq_ignore_ascii_case("desc") {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            out.push(OrderSpec { field, sort });
        }
        Ok(out)
    }

    /// Generate an ORDER BY clause over JSONB accessors.
    pub fn to_sql(specs: &[OrderSpec]) -> Result<String, FilterError> {
        if specs.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(specs.len());
        for spec in specs {
            validate_field(&spec.field)?;
            parts.push(format!("doc->'{}' {}", spec.field, spec.sort.to_sql()));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    /// Compare two documents under a sort specification (memory backend).
    pub fn compare(specs: &[OrderSpec], a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
        for spec in specs {
            let va = a.get(&spec.field).unwrap_or(&Value::Null);
            let vb = b.get(&spec.field).unwrap_or(&Value::Null);
            let ord = cmp_json(va, vb);
            let ord = match spec.sort {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_object_form() {
        let specs = FilterOrder::parse(&json!({ "createdAt": "desc", "views": 1 })).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].field, "createdAt");
        assert_eq!(specs[0].sort, SortDirection::Desc);
        assert_eq!(specs[1].sort, SortDirection::Asc);
    }

    #[test]
    fn parses_string_form() {
        let specs = FilterOrder::parse(&json!("createdAt desc, title")).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].field, "title");
        assert_eq!(specs[1].sort, SortDirection::Asc);
    }

    #[test]
    fn rejects_bad_direction() {
        assert!(FilterOrder::parse(&json!({ "views": "sideways" })).is_err());
        assert!(FilterOrder::parse(&json!(42)).is_err());
    }

    #[test]
    fn sql_clause() {
        let specs = FilterOrder::parse(&json!({ "views": -1 })).unwrap();
        assert_eq!(FilterOrder::to_sql(&specs).unwrap(), "ORDER BY doc->'views' DESC");
        assert_eq!(FilterOrder::to_sql(&[]).unwrap(), "");
    }

    #[test]
    fn compares_documents() {
        let specs = FilterOrder::parse(&json!({ "views": "desc" })).unwrap();
        let a = json!({ "views": 10 }).as_object().unwrap().clone();
        let b = json!({ "views": 3 }).as_object().unwrap().clone();
        assert_eq!(FilterOrder::compare(&specs, &a, &b), Ordering::Less);
    }
}
