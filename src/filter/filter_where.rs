use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{FilterOp, SqlParam, WhereNode};

/// Validate a document field name before it is interpolated into a JSONB
/// accessor. Same charset rule the rest of the system uses for identifiers.
pub fn validate_field(name: &str) -> Result<(), FilterError> {
    if name.is_empty() {
        return Err(FilterError::InvalidField("field name cannot be empty".to_string()));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(FilterError::InvalidField(format!("invalid field name: {}", name)));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FilterError::InvalidField(format!("invalid field name: {}", name)));
    }
    Ok(())
}

impl WhereNode {
    /// Single-field equality condition.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> WhereNode {
        WhereNode::Cond {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Parse a Mongo-style filter object into a tree.
    pub fn parse(where_data: &Value) -> Result<WhereNode, FilterError> {
        match where_data {
            Value::Object(obj) => {
                let mut nodes = Vec::with_capacity(obj.len());
                for (key, value) in obj {
                    if key.starts_with('$') {
                        nodes.push(Self::parse_logical(key, value)?);
                    } else {
                        nodes.push(Self::parse_field(key, value)?);
                    }
                }
                Ok(match nodes.len() {
                    1 => nodes.pop().unwrap(),
                    _ => WhereNode::And(nodes),
                })
            }
            _ => Err(FilterError::InvalidWhereClause(
                "filter must be a JSON object".to_string(),
            )),
        }
    }

    fn parse_logical(op: &str, value: &Value) -> Result<WhereNode, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value.as_array().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{} requires an array", op))
                })?;
                if arr.is_empty() {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} requires a non-empty array",
                        op
                    )));
                }
                let nodes = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { WhereNode::And(nodes) } else { WhereNode::Or(nodes) })
            }
            "$not" => Ok(WhereNode::Not(Box::new(Self::parse(value)?))),
            other => Err(FilterError::UnsupportedOperator(other.to_string())),
        }
    }

    fn parse_field(field: &str, value: &Value) -> Result<WhereNode, FilterError> {
        validate_field(field)?;

        // An object whose keys are all operators expands to one condition per
        // operator; any other value is an implicit equality match.
        if let Value::Object(obj) = value {
            if obj.keys().any(|k| k.starts_with('$')) {
                let mut nodes = Vec::with_capacity(obj.len());
                for (op_key, op_val) in obj {
                    let op = map_operator(op_key)?;
                    validate_operator_data(op, op_val)?;
                    nodes.push(WhereNode::Cond {
                        field: field.to_string(),
                        op,
                        value: op_val.clone(),
                    });
                }
                return Ok(match nodes.len() {
                    1 => nodes.pop().unwrap(),
                    _ => WhereNode::And(nodes),
                });
            }
        }

        Ok(WhereNode::Cond {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.clone(),
        })
    }

    /// Compile the tree into a SQL predicate over a `doc` JSONB column,
    /// appending bind parameters to `params`.
    pub fn to_sql(&self, params: &mut Vec<SqlParam>) -> Result<String, FilterError> {
        match self {
            WhereNode::And(nodes) if nodes.is_empty() => Ok("TRUE".to_string()),
            WhereNode::And(nodes) => {
                let parts = nodes
                    .iter()
                    .map(|n| n.to_sql(params))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", parts.join(" AND ")))
            }
            WhereNode::Or(nodes) => {
                let parts = nodes
                    .iter()
                    .map(|n| n.to_sql(params))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", parts.join(" OR ")))
            }
            WhereNode::Not(node) => Ok(format!("NOT ({})", node.to_sql(params)?)),
            WhereNode::Cond { field, op, value } => cond_to_sql(field, *op, value, params),
        }
    }

    /// Evaluate the tree against a document's field map.
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        match self {
            WhereNode::And(nodes) => nodes.iter().all(|n| n.matches(doc)),
            WhereNode::Or(nodes) => nodes.iter().any(|n| n.matches(doc)),
            WhereNode::Not(node) => !node.matches(doc),
            WhereNode::Cond { field, op, value } => eval_condition(doc.get(field), *op, value),
        }
    }
}

fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
    Ok(match op_key {
        "$eq" => FilterOp::Eq,
        "$ne" | "$neq" => FilterOp::Ne,
        "$gt" => FilterOp::Gt,
        "$gte" => FilterOp::Gte,
        "$lt" => FilterOp::Lt,
        "$lte" => FilterOp::Lte,
        "$in" => FilterOp::In,
        "$nin" => FilterOp::NIn,
        "$like" => FilterOp::Like,
        "$ilike" => FilterOp::ILike,
        "$exists" => FilterOp::Exists,
        other => return Err(FilterError::UnsupportedOperator(other.to_string())),
    })
}

fn validate_operator_data(op: FilterOp, value: &Value) -> Result<(), FilterError> {
    match op {
        FilterOp::In | FilterOp::NIn if !value.is_array() => Err(
            FilterError::InvalidOperatorData("$in/$nin require an array".to_string()),
        ),
        FilterOp::Like | FilterOp::ILike if !value.is_string() => Err(
            FilterError::InvalidOperatorData("$like/$ilike require a string pattern".to_string()),
        ),
        FilterOp::Exists if !value.is_boolean() => Err(FilterError::InvalidOperatorData(
            "$exists requires a boolean".to_string(),
        )),
        _ => Ok(()),
    }
}

fn cond_to_sql(
    field: &str,
    op: FilterOp,
    value: &Value,
    params: &mut Vec<SqlParam>,
) -> Result<String, FilterError> {
    validate_field(field)?;
    let acc = format!("doc->'{}'", field);
    let text_acc = format!("doc->>'{}'", field);

    let mut bind = |p: SqlParam| -> String {
        params.push(p);
        format!("${}", params.len())
    };

    Ok(match op {
        FilterOp::Eq => {
            if value.is_null() {
                format!("({acc} IS NULL OR {acc} = 'null'::jsonb)")
            } else {
                let p = bind(SqlParam::Jsonb(value.clone()));
                format!("{acc} = {p}")
            }
        }
        FilterOp::Ne => {
            if value.is_null() {
                format!("({acc} IS NOT NULL AND {acc} <> 'null'::jsonb)")
            } else {
                let p = bind(SqlParam::Jsonb(value.clone()));
                format!("({acc} IS NULL OR {acc} <> {p})")
            }
        }
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            let sql_op = match op {
                FilterOp::Gt => ">",
                FilterOp::Gte => ">=",
                FilterOp::Lt => "<",
                _ => "<=",
            };
            let p = bind(SqlParam::Jsonb(value.clone()));
            format!("{acc} {sql_op} {p}")
        }
        FilterOp::In => {
            let arr = value.as_array().expect("validated");
            if arr.is_empty() {
                "FALSE".to_string()
            } else {
                let p = bind(SqlParam::Jsonb(value.clone()));
                format!("{acc} IN (SELECT value FROM jsonb_array_elements({p}))")
            }
        }
        FilterOp::NIn => {
            let arr = value.as_array().expect("validated");
            if arr.is_empty() {
                "TRUE".to_string()
            } else {
                let p = bind(SqlParam::Jsonb(value.clone()));
                format!("({acc} IS NULL OR {acc} NOT IN (SELECT value FROM jsonb_array_elements({p})))")
            }
        }
        FilterOp::Like => {
            let p = bind(SqlParam::Text(value.as_str().expect("validated").to_string()));
            format!("{text_acc} LIKE {p}")
        }
        FilterOp::ILike => {
            let p = bind(SqlParam::Text(value.as_str().expect("validated").to_string()));
            format!("{text_acc} ILIKE {p}")
        }
        FilterOp::Exists => {
            let p = bind(SqlParam::Text(field.to_string()));
            if value.as_bool().expect("validated") {
                format!("jsonb_exists(doc, {p})")
            } else {
                format!("NOT jsonb_exists(doc, {p})")
            }
        }
    })
}

fn eval_condition(actual: Option<&Value>, op: FilterOp, expected: &Value) -> bool {
    match op {
        FilterOp::Eq => match actual {
            None => expected.is_null(),
            Some(a) => a == expected,
        },
        FilterOp::Ne => !eval_condition(actual, FilterOp::Eq, expected),
        FilterOp::Gt => matches!(actual.map(|a| cmp_json(a, expected)), Some(Ordering::Greater)),
        FilterOp::Gte => matches!(
            actual.map(|a| cmp_json(a, expected)),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        FilterOp::Lt => matches!(actual.map(|a| cmp_json(a, expected)), Some(Ordering::Less)),
        FilterOp::Lte => matches!(
            actual.map(|a| cmp_json(a, expected)),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        FilterOp::In => match (actual, expected.as_array()) {
            (Some(a), Some(arr)) => arr.contains(a),
            _ => false,
        },
        FilterOp::NIn => !eval_condition(actual, FilterOp::In, expected),
        FilterOp::Like => like_matches(actual, expected, false),
        FilterOp::ILike => like_matches(actual, expected, true),
        FilterOp::Exists => actual.is_some() == expected.as_bool().unwrap_or(false),
    }
}

fn like_matches(actual: Option<&Value>, pattern: &Value, case_insensitive: bool) -> bool {
    match (actual.and_then(|v| v.as_str()), pattern.as_str()) {
        (Some(text), Some(pat)) => like_match(pat, text, case_insensitive),
        _ => false,
    }
}

/// SQL LIKE semantics: `%` matches any run, `_` matches one character.
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let mut re = String::with_capacity(pattern.len() + 8);
    if case_insensitive {
        re.push_str("(?i)");
    }
    re.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    match Regex::new(&re) {
        Ok(rx) => rx.is_match(text),
        Err(_) => false,
    }
}

/// Total order over JSON values, matching the Postgres jsonb type-rank order
/// so both store backends sort and compare identically.
pub fn cmp_json(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::String(_) => 1,
            Value::Number(_) => 2,
            Value::Bool(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let fx = x.as_f64().unwrap_or(f64::NAN);
            let fy = y.as_f64().unwrap_or(f64::NAN);
            fx.partial_cmp(&fy).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                let ord = cmp_json(ex, ey);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn implicit_equality() {
        let node = WhereNode::parse(&json!({ "category": "Tech" })).unwrap();
        assert!(node.matches(&doc(json!({ "category": "Tech" }))));
        assert!(!node.matches(&doc(json!({ "category": "News" }))));
        assert!(!node.matches(&doc(json!({}))));
    }

    #[test]
    fn multiple_fields_are_anded() {
        let node = WhereNode::parse(&json!({ "role": "admin", "isActive": true })).unwrap();
        assert!(node.matches(&doc(json!({ "role": "admin", "isActive": true }))));
        assert!(!node.matches(&doc(json!({ "role": "admin", "isActive": false }))));
    }

    #[test]
    fn comparison_operators() {
        let node = WhereNode::parse(&json!({ "views": { "$gte": 10, "$lt": 100 } })).unwrap();
        assert!(node.matches(&doc(json!({ "views": 10 }))));
        assert!(node.matches(&doc(json!({ "views": 99 }))));
        assert!(!node.matches(&doc(json!({ "views": 100 }))));
        assert!(!node.matches(&doc(json!({ "views": 5 }))));
        // Missing field never satisfies a range condition.
        assert!(!node.matches(&doc(json!({}))));
    }

    #[test]
    fn in_and_nin() {
        let node = WhereNode::parse(&json!({ "role": { "$in": ["admin", "editor"] } })).unwrap();
        assert!(node.matches(&doc(json!({ "role": "editor" }))));
        assert!(!node.matches(&doc(json!({ "role": "user" }))));

        let node = WhereNode::parse(&json!({ "role": { "$nin": ["guest"] } })).unwrap();
        assert!(node.matches(&doc(json!({ "role": "user" }))));
        assert!(node.matches(&doc(json!({}))));
        assert!(!node.matches(&doc(json!({ "role": "guest" }))));
    }

    #[test]
    fn like_and_ilike() {
        let node = WhereNode::parse(&json!({ "title": { "$like": "Rust%" } })).unwrap();
        assert!(node.matches(&doc(json!({ "title": "Rust in production" }))));
        assert!(!node.matches(&doc(json!({ "title": "rust in production" }))));

        let node = WhereNode::parse(&json!({ "title": { "$ilike": "%rust%" } })).unwrap();
        assert!(node.matches(&doc(json!({ "title": "Practical Rust" }))));
    }

    #[test]
    fn exists_and_null_equality() {
        let node = WhereNode::parse(&json!({ "tags": { "$exists": true } })).unwrap();
        assert!(node.matches(&doc(json!({ "tags": [] }))));
        assert!(!node.matches(&doc(json!({}))));

        // Null equality matches both explicit null and a missing field.
        let node = WhereNode::parse(&json!({ "category": null })).unwrap();
        assert!(node.matches(&doc(json!({ "category": null }))));
        assert!(node.matches(&doc(json!({}))));
        assert!(!node.matches(&doc(json!({ "category": "Tech" }))));
    }

    #[test]
    fn logical_operators() {
        let node = WhereNode::parse(&json!({
            "$or": [ { "views": { "$gt": 100 } }, { "likes": { "$gt": 10 } } ]
        }))
        .unwrap();
        assert!(node.matches(&doc(json!({ "views": 5, "likes": 20 }))));
        assert!(!node.matches(&doc(json!({ "views": 5, "likes": 5 }))));

        let node = WhereNode::parse(&json!({ "$not": { "role": "guest" } })).unwrap();
        assert!(node.matches(&doc(json!({ "role": "user" }))));
        assert!(!node.matches(&doc(json!({ "role": "guest" }))));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(WhereNode::parse(&json!("raw sql")).is_err());
        assert!(WhereNode::parse(&json!({ "views": { "$regex": "x" } })).is_err());
        assert!(WhereNode::parse(&json!({ "role": { "$in": "admin" } })).is_err());
        assert!(WhereNode::parse(&json!({ "bad-field!": 1 })).is_err());
        assert!(WhereNode::parse(&json!({ "$or": [] })).is_err());
    }

    #[test]
    fn sql_generation_binds_params_in_order() {
        let node = WhereNode::parse(&json!({ "category": "Tech", "views": { "$gte": 10 } })).unwrap();
        let mut params = Vec::new();
        let sql = node.to_sql(&mut params).unwrap();
        assert_eq!(sql, "(doc->'category' = $1 AND doc->'views' >= $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn sql_generation_empty_in_is_false() {
        let node = WhereNode::parse(&json!({ "role": { "$in": [] } })).unwrap();
        let mut params = Vec::new();
        assert_eq!(node.to_sql(&mut params).unwrap(), "FALSE");
        assert!(params.is_empty());
    }

    #[test]
    fn json_ordering_matches_jsonb_type_ranks() {
        assert_eq!(cmp_json(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(cmp_json(&json!("b"), &json!("a")), Ordering::Greater);
        // Numbers sort above strings in jsonb ordering.
        assert_eq!(cmp_json(&json!(1), &json!("z")), Ordering::Greater);
        assert_eq!(cmp_json(&json!(null), &json!("a")), Ordering::Less);
    }

    #[test]
    fn like_match_wildcards() {
        assert!(like_match("abc%", "abcdef", false));
        assert!(like_match("a_c", "abc", false));
        assert!(!like_match("a_c", "abbc", false));
        assert!(like_match("%.rs", "main.rs", false));
        assert!(!like_match("%.rs", "mainxrs", false));
    }
}
