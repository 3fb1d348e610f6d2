//! Response shaping: reduced list rows, full detail rows, sensitive-field
//! stripping.

use serde_json::{json, Map, Value};

use crate::store::Document;

const LIST_CONTENT_LIMIT: usize = 150;

/// Truncate long text for list views, appending an ellipsis marker.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

fn field(doc: &Document, key: &str) -> Value {
    doc.get(key).cloned().unwrap_or(Value::Null)
}

pub fn article_list_item(doc: &Document) -> Value {
    json!({
        "id": field(doc, "id"),
        "title": field(doc, "title"),
        "authorName": field(doc, "authorName"),
        "category": field(doc, "category"),
        "tags": field(doc, "tags"),
        "views": field(doc, "views"),
        "likes": field(doc, "likes"),
        "isPublished": field(doc, "isPublished"),
        "createdAt": field(doc, "createdAt"),
        "content": doc.get_str("content").map(|c| truncate(c, LIST_CONTENT_LIMIT)).unwrap_or_default(),
    })
}

pub fn articles_list(docs: &[Document]) -> Value {
    json!({
        "message": "Article list",
        "count": docs.len(),
        "articles": docs.iter().map(article_list_item).collect::<Vec<_>>(),
    })
}

pub fn article_detail(doc: &Document) -> Value {
    json!({
        "message": format!("Article: {}", doc.get_str("title").unwrap_or("")),
        "article": doc.to_value(),
    })
}

/// Reduced shape used when reporting deleted articles.
pub fn article_summary(doc: &Document) -> Value {
    json!({
        "id": field(doc, "id"),
        "title": field(doc, "title"),
        "authorName": field(doc, "authorName"),
        "category": field(doc, "category"),
        "createdAt": field(doc, "createdAt"),
    })
}

/// Strip the password hash from a user document. Applied to every outgoing
/// user record, including projection/find results.
pub fn sanitize_user(doc: &Document) -> Value {
    let mut fields: Map<String, Value> = doc.fields().clone();
    fields.remove("password");
    Value::Object(fields)
}

pub fn sanitize_users(docs: &[Document]) -> Vec<Value> {
    docs.iter().map(sanitize_user).collect()
}

pub fn user_list_item(doc: &Document) -> Value {
    json!({
        "id": field(doc, "id"),
        "username": field(doc, "username"),
        "firstName": field(doc, "firstName"),
        "lastName": field(doc, "lastName"),
        "email": field(doc, "email"),
        "role": field(doc, "role"),
        "isActive": field(doc, "isActive"),
        "createdAt": field(doc, "createdAt"),
    })
}

pub fn users_list(docs: &[Document]) -> Value {
    json!({
        "message": "User list",
        "count": docs.len(),
        "users": docs.iter().map(user_list_item).collect::<Vec<_>>(),
    })
}

pub fn user_detail(doc: &Document) -> Value {
    json!({
        "message": format!("User {}", doc.get_str("username").unwrap_or("")),
        "user": sanitize_user(doc),
    })
}
