use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::password;
use crate::config;
use crate::error::ApiError;
use crate::pages;
use crate::middleware::accepts_html;
use crate::store::{DocId, Document};
use crate::validate;
use crate::views;
use crate::AppState;

use super::articles::{FilterBody, FilterUpdateBody, FilterReplaceBody};
use super::negotiated_not_found;

#[derive(Debug, Deserialize)]
pub struct UserFindParams {
    pub filter: Option<String>,
    pub projection: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserSearchParams {
    pub q: Option<String>,
    pub projection: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

/// Validate the identity fields of a user payload and hash any password.
async fn prepare_user_doc(payload: Value, label: Option<usize>) -> Result<Document, ApiError> {
    let prefix = |e: ApiError| match label {
        Some(n) => ApiError::bad_request(format!("User {}: {}", n, e.message())),
        None => e,
    };

    let body = payload
        .as_object()
        .ok_or_else(|| prefix(ApiError::bad_request("expected an object")))?;
    let username = body
        .get("username")
        .and_then(Value::as_str)
        .ok_or_else(|| prefix(ApiError::bad_request("username is required")))?;
    let email = body
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| prefix(ApiError::bad_request("email is required")))?;
    validate::username(username).map_err(&prefix)?;
    validate::email(email).map_err(&prefix)?;

    let mut doc = Document::from_api_input(payload.clone())?;
    if let Some(raw_password) = body.get("password").and_then(Value::as_str) {
        validate::password(raw_password).map_err(&prefix)?;
        let hashed = password::hash_blocking(
            raw_password.to_string(),
            config::config().security.bcrypt_cost,
        )
        .await?;
        doc.set("password", hashed);
    }
    Ok(doc)
}

/// GET /users
pub async fn get_all(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let docs = state.users.get_all().await?;
    if accepts_html(&headers) {
        Ok(pages::users_page(&docs).into_response())
    } else {
        Ok(Json(views::users_list(&docs)).into_response())
    }
}

/// GET /users/:userId
pub async fn get_by_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = DocId::parse(&user_id);
    match state.users.get_by_id(&id).await? {
        None => Ok(negotiated_not_found(&headers, "User not found")),
        Some(doc) => {
            if accepts_html(&headers) {
                Ok(pages::user_page(&doc).into_response())
            } else {
                Ok(Json(views::user_detail(&doc)).into_response())
            }
        }
    }
}

/// POST /users
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let doc = prepare_user_doc(payload, None).await?;
    state.users.create(doc).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "status": "created" })),
    )
        .into_response())
}

/// PUT /users/:userId
pub async fn update(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let id = DocId::parse(&user_id);
    let body = validate::non_empty_object(Some(&payload), "body")?;
    if let Some(email) = body.get("email").and_then(Value::as_str) {
        validate::email(email)?;
    }
    if let Some(username) = body.get("username").and_then(Value::as_str) {
        validate::username(username)?;
    }

    let mut changes = Document::sanitize_update(payload.clone())?;
    if let Some(raw_password) = body.get("password").and_then(Value::as_str) {
        validate::password(raw_password)?;
        let hashed = password::hash_blocking(
            raw_password.to_string(),
            config::config().security.bcrypt_cost,
        )
        .await?;
        changes.insert("password".to_string(), Value::from(hashed));
    }

    if state.users.update(&id, changes).await? {
        Ok(Json(json!({
            "message": format!("User {} updated successfully", id),
            "status": "updated",
        }))
        .into_response())
    } else {
        Err(ApiError::not_found("User not found"))
    }
}

/// DELETE /users/:userId
pub async fn delete(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = DocId::parse(&user_id);
    if state.users.delete(&id).await? {
        Ok(Json(json!({ "message": "User deleted successfully", "status": "deleted" })).into_response())
    } else {
        Err(ApiError::not_found("User not found"))
    }
}

/// POST /users/insertOne
pub async fn insert_one(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let doc = prepare_user_doc(payload, None).await?;
    let result = state.users.insert_one(doc).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User created successfully",
            "insertedId": result.inserted_id,
            "user": views::sanitize_user(&result.record),
        })),
    )
        .into_response())
}

/// POST /users/insertMany
pub async fn insert_many(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let items = payload
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::bad_request("Expected a non-empty array of users"))?;

    let mut docs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        docs.push(prepare_user_doc(item.clone(), Some(index + 1)).await?);
    }

    let result = state.users.insert_many(docs).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Successfully created {} users", result.inserted_count),
            "insertedCount": result.inserted_count,
            "users": result.records.iter().map(views::sanitize_user).collect::<Vec<_>>(),
        })),
    )
        .into_response())
}

/// PUT /users/updateOne
pub async fn update_one(
    State(state): State<AppState>,
    Json(body): Json<FilterUpdateBody>,
) -> Result<Response, ApiError> {
    validate::non_empty_object(body.filter.as_ref(), "filter")?;
    let update = validate::non_empty_object(body.update.as_ref(), "update")?;
    if let Some(email) = update.get("email").and_then(Value::as_str) {
        validate::email(email)?;
    }

    let changes = Document::sanitize_update(body.update.clone().unwrap())?;
    let result = state
        .users
        .update_one_by_filter(body.filter.as_ref().unwrap(), changes)
        .await?;

    if result.success {
        Ok(Json(json!({
            "message": "User updated successfully",
            "matchedCount": result.matched_count,
            "modifiedCount": result.modified_count,
            "user": result.record.as_ref().map(views::sanitize_user),
        }))
        .into_response())
    } else {
        Err(ApiError::not_found("User not found"))
    }
}

/// PUT /users/updateMany
pub async fn update_many(
    State(state): State<AppState>,
    Json(body): Json<FilterUpdateBody>,
) -> Result<Response, ApiError> {
    validate::object(body.filter.as_ref(), "filter")?;
    validate::non_empty_object(body.update.as_ref(), "update")?;

    let changes = Document::sanitize_update(body.update.clone().unwrap())?;
    let result = state
        .users
        .update_many_by_filter(body.filter.as_ref().unwrap(), changes)
        .await?;

    Ok(Json(json!({
        "message": format!("Updated {} of {} users", result.modified_count, result.matched_count),
        "matchedCount": result.matched_count,
        "modifiedCount": result.modified_count,
    }))
    .into_response())
}

/// PUT /users/replaceOne
pub async fn replace_one(
    State(state): State<AppState>,
    Json(body): Json<FilterReplaceBody>,
) -> Result<Response, ApiError> {
    validate::non_empty_object(body.filter.as_ref(), "filter")?;
    let replacement = body
        .replacement
        .clone()
        .ok_or_else(|| ApiError::bad_request("Required parameter: replacement (object)"))?;
    let doc = prepare_user_doc(replacement, None).await?;

    let result = state
        .users
        .replace_one_by_filter(body.filter.as_ref().unwrap(), doc)
        .await?;

    if result.success {
        Ok(Json(json!({
            "message": "User replaced successfully",
            "user": result.record.as_ref().map(views::sanitize_user),
        }))
        .into_response())
    } else {
        Err(ApiError::not_found("User to replace not found"))
    }
}

/// DELETE /users/deleteOne
pub async fn delete_one(
    State(state): State<AppState>,
    Json(body): Json<FilterBody>,
) -> Result<Response, ApiError> {
    validate::non_empty_object(body.filter.as_ref(), "filter")?;

    let result = state
        .users
        .delete_one_by_filter(body.filter.as_ref().unwrap())
        .await?;

    match result.deleted_record {
        Some(record) if result.success => {
            let name = record
                .get_str("username")
                .or_else(|| record.get_str("email"))
                .unwrap_or("");
            Ok(Json(json!({
                "message": format!("User {} deleted successfully", name),
                "deletedCount": result.deleted_count,
                "deletedUser": views::sanitize_user(&record),
            }))
            .into_response())
        }
        _ => Err(ApiError::not_found("User to delete not found")),
    }
}

/// DELETE /users/deleteMany
pub async fn delete_many(
    State(state): State<AppState>,
    Json(body): Json<FilterBody>,
) -> Result<Response, ApiError> {
    let filter = validate::non_empty_object(body.filter.as_ref(), "filter")?;
    validate::broad_delete_guard(filter, "role")?;

    let result = state
        .users
        .delete_many_by_filter(body.filter.as_ref().unwrap())
        .await?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("No users matched the filter"));
    }
    Ok(Json(json!({
        "message": format!("Successfully deleted {} users", result.deleted_count),
        "deletedCount": result.deleted_count,
        "deletedUsers": result
            .deleted_records
            .iter()
            .map(views::sanitize_user)
            .collect::<Vec<_>>(),
    }))
    .into_response())
}

/// GET /users/find - filter + projection query.
pub async fn find(
    State(state): State<AppState>,
    Query(params): Query<UserFindParams>,
) -> Result<Response, ApiError> {
    let filter = validate::json_param(params.filter.as_deref().unwrap_or("{}"), "filter")?;
    let projection =
        validate::json_param(params.projection.as_deref().unwrap_or("{}"), "projection")?;

    let docs = state.users.find_with_projection(&filter, &projection).await?;
    Ok(Json(json!({
        "message": format!("Found {} users", docs.len()),
        "users": views::sanitize_users(&docs),
    }))
    .into_response())
}

/// GET /users/search - free-text search over identity fields.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<UserSearchParams>,
) -> Result<Response, ApiError> {
    let query = validate::search_query(params.q.as_deref().unwrap_or(""))?;
    let projection =
        validate::json_param(params.projection.as_deref().unwrap_or("{}"), "projection")?;
    let limit = params.limit.as_deref().and_then(|s| s.parse().ok()).unwrap_or(20);
    let skip = params.skip.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0);

    let result = state.users.search(&query, None, limit, skip, &projection).await?;
    Ok(Json(json!({
        "message": format!("Found {} users for \"{}\"", result.count, query),
        "users": result.records.iter().map(views::sanitize_user).collect::<Vec<_>>(),
        "count": result.count,
    }))
    .into_response())
}

/// GET /users/statistics - role aggregation.
pub async fn statistics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state.users.statistics().await?;
    Ok(Json(json!({
        "message": "User statistics",
        "statistics": stats,
    }))
    .into_response())
}
