use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::filter::{FilterData, WhereNode};
use crate::middleware::{accepts_html, CurrentUser};
use crate::pages;
use crate::store::{DocId, Document};
use crate::validate;
use crate::views;
use crate::AppState;

use super::{author_info, negotiated_not_found};

#[derive(Debug, Deserialize)]
pub struct FilterUpdateBody {
    pub filter: Option<Value>,
    pub update: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FilterReplaceBody {
    pub filter: Option<Value>,
    pub replacement: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FilterBody {
    pub filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FindParams {
    pub filter: Option<String>,
    pub projection: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub q: Option<String>,
    pub projection: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
    pub published_only: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateParams {
    pub group_by: Option<String>,
    pub include_stats: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopParams {
    pub sort_by: Option<String>,
    pub limit: Option<String>,
    pub published_only: Option<String>,
}

fn int_param(raw: &Option<String>, default: i64) -> i64 {
    raw.as_deref().and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// GET /articles
pub async fn get_all(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let docs = state.articles.get_all().await?;
    if accepts_html(&headers) {
        Ok(pages::articles_page(&docs).into_response())
    } else {
        Ok(Json(views::articles_list(&docs)).into_response())
    }
}

/// GET /articles/:articleId - reads count as views.
pub async fn get_by_id(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(article_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = DocId::parse(&article_id);
    match state.articles.get_by_id_counting_view(&id).await? {
        None => Ok(negotiated_not_found(&headers, "Article not found")),
        Some(doc) => {
            if accepts_html(&headers) {
                Ok(pages::article_page(&doc).into_response())
            } else {
                Ok(Json(views::article_detail(&doc)).into_response())
            }
        }
    }
}

/// POST /articles
pub async fn create(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let body = validate::object(Some(&payload), "body")?;
    let title = validate::title(body.get("title"))?;
    let content = validate::content(body.get("content"))?;

    let (author_id, author_name) = author_info(&user);
    let mut doc = Document::new();
    doc.set("title", title);
    doc.set("content", content);
    doc.set("authorId", author_id);
    doc.set("authorName", author_name);

    state.articles.create(doc).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Article created successfully", "status": "created" })),
    )
        .into_response())
}

/// PUT /articles/:articleId
pub async fn update(
    State(state): State<AppState>,
    Path(article_id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let id = DocId::parse(&article_id);
    if !state.articles.exists(&id).await? {
        return Err(ApiError::not_found("Article not found"));
    }

    let body = validate::object(Some(&payload), "body")?;
    let title = validate::title(body.get("title"))?;
    let content = validate::content(body.get("content"))?;

    let mut changes = Map::new();
    changes.insert("title".to_string(), Value::from(title));
    changes.insert("content".to_string(), Value::from(content));

    if state.articles.update(&id, changes).await? {
        Ok(Json(json!({
            "message": format!("Article {} updated successfully", id),
            "status": "updated",
        }))
        .into_response())
    } else {
        Err(ApiError::not_found("Article not found"))
    }
}

/// DELETE /articles/:articleId
pub async fn delete(
    State(state): State<AppState>,
    Path(article_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = DocId::parse(&article_id);
    if !state.articles.exists(&id).await? {
        return Err(ApiError::not_found("Article not found"));
    }
    if state.articles.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::not_found("Article not found"))
    }
}

/// POST /articles/insertOne
pub async fn insert_one(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let body = validate::object(Some(&payload), "body")?;
    if body.get("title").is_none() || body.get("content").is_none() {
        return Err(ApiError::bad_request("Required fields: title, content"));
    }
    validate::title(body.get("title"))?;
    validate::content(body.get("content"))?;

    let mut doc = Document::from_api_input(payload)?;
    let (author_id, author_name) = author_info(&user);
    doc.set("authorId", author_id);
    doc.set("authorName", author_name);

    let result = state.articles.insert_one(doc).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Article created successfully",
            "insertedId": result.inserted_id,
            "article": result.record.to_value(),
        })),
    )
        .into_response())
}

/// POST /articles/insertMany
pub async fn insert_many(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let items = payload
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::bad_request("Expected a non-empty array of articles"))?;

    let (author_id, author_name) = author_info(&user);
    let mut docs = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let body = item.as_object().ok_or_else(|| {
            ApiError::bad_request(format!("Article {}: expected an object", index + 1))
        })?;
        if body.get("title").is_none() || body.get("content").is_none() {
            return Err(ApiError::bad_request(format!(
                "Article {}: required fields title, content",
                index + 1
            )));
        }
        validate::title(body.get("title"))
            .map_err(|e| ApiError::bad_request(format!("Article {}: {}", index + 1, e.message())))?;
        validate::content(body.get("content"))
            .map_err(|e| ApiError::bad_request(format!("Article {}: {}", index + 1, e.message())))?;

        let mut doc = Document::from_api_input(item.clone())?;
        doc.set("authorId", author_id.clone());
        doc.set("authorName", author_name.clone());
        docs.push(doc);
    }

    let result = state.articles.insert_many(docs).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("Successfully created {} articles", result.inserted_count),
            "insertedCount": result.inserted_count,
            "articles": result.records.iter().map(Document::to_value).collect::<Vec<_>>(),
        })),
    )
        .into_response())
}

/// PUT /articles/updateOne
pub async fn update_one(
    State(state): State<AppState>,
    Json(body): Json<FilterUpdateBody>,
) -> Result<Response, ApiError> {
    validate::non_empty_object(body.filter.as_ref(), "filter")?;
    let update = validate::non_empty_object(body.update.as_ref(), "update")?;
    if update.contains_key("title") {
        validate::title(update.get("title"))?;
    }
    if let Some(content) = update.get("content") {
        if !content.is_null() {
            validate::content(Some(content))?;
        }
    }

    let changes = Document::sanitize_update(body.update.clone().unwrap())?;
    let result = state
        .articles
        .update_one_by_filter(body.filter.as_ref().unwrap(), changes)
        .await?;

    if result.success {
        Ok(Json(json!({
            "message": "Article updated successfully",
            "matchedCount": result.matched_count,
            "modifiedCount": result.modified_count,
            "article": result.record.map(|d| d.to_value()),
        }))
        .into_response())
    } else {
        Err(ApiError::not_found("Article not found"))
    }
}

/// PUT /articles/updateMany - zero matches is still a success.
pub async fn update_many(
    State(state): State<AppState>,
    Json(body): Json<FilterUpdateBody>,
) -> Result<Response, ApiError> {
    validate::object(body.filter.as_ref(), "filter")?;
    let update = validate::non_empty_object(body.update.as_ref(), "update")?;
    if update.contains_key("title") {
        validate::title(update.get("title"))?;
    }

    let changes = Document::sanitize_update(body.update.clone().unwrap())?;
    let result = state
        .articles
        .update_many_by_filter(body.filter.as_ref().unwrap(), changes)
        .await?;

    Ok(Json(json!({
        "message": format!("Updated {} of {} articles", result.modified_count, result.matched_count),
        "matchedCount": result.matched_count,
        "modifiedCount": result.modified_count,
    }))
    .into_response())
}

/// PUT /articles/replaceOne
pub async fn replace_one(
    State(state): State<AppState>,
    user: Option<CurrentUser>,
    Json(body): Json<FilterReplaceBody>,
) -> Result<Response, ApiError> {
    validate::non_empty_object(body.filter.as_ref(), "filter")?;
    let replacement = validate::object(body.replacement.as_ref(), "replacement")?;
    if replacement.get("title").is_none() || replacement.get("content").is_none() {
        return Err(ApiError::bad_request(
            "Replacement requires fields: title, content",
        ));
    }
    validate::title(replacement.get("title"))?;
    validate::content(replacement.get("content"))?;

    let mut doc = Document::from_api_input(body.replacement.clone().unwrap())?;
    let (author_id, author_name) = author_info(&user);
    doc.set("authorId", author_id);
    doc.set("authorName", author_name);

    let result = state
        .articles
        .replace_one_by_filter(body.filter.as_ref().unwrap(), doc)
        .await?;

    if result.success {
        Ok(Json(json!({
            "message": "Article replaced successfully",
            "article": result.record.map(|d| d.to_value()),
        }))
        .into_response())
    } else {
        Err(ApiError::not_found("Article to replace not found"))
    }
}

/// DELETE /articles/deleteOne
pub async fn delete_one(
    State(state): State<AppState>,
    Json(body): Json<FilterBody>,
) -> Result<Response, ApiError> {
    validate::non_empty_object(body.filter.as_ref(), "filter")?;

    let result = state
        .articles
        .delete_one_by_filter(body.filter.as_ref().unwrap())
        .await?;

    match result.deleted_record {
        Some(record) if result.success => Ok(Json(json!({
            "message": format!(
                "Article \"{}\" deleted successfully",
                record.get_str("title").unwrap_or("")
            ),
            "deletedCount": result.deleted_count,
            "deletedArticle": views::article_summary(&record),
        }))
        .into_response()),
        _ => Err(ApiError::not_found("Article to delete not found")),
    }
}

/// DELETE /articles/deleteMany
pub async fn delete_many(
    State(state): State<AppState>,
    Json(body): Json<FilterBody>,
) -> Result<Response, ApiError> {
    let filter = validate::non_empty_object(body.filter.as_ref(), "filter")?;
    validate::broad_delete_guard(filter, "isPublished")?;

    let result = state
        .articles
        .delete_many_by_filter(body.filter.as_ref().unwrap())
        .await?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("No articles matched the filter"));
    }
    Ok(Json(json!({
        "message": format!("Successfully deleted {} articles", result.deleted_count),
        "deletedCount": result.deleted_count,
        "deletedArticles": result
            .deleted_records
            .iter()
            .map(views::article_summary)
            .collect::<Vec<_>>(),
    }))
    .into_response())
}

/// GET /articles/find - composite filter/projection/sort/limit/skip query.
pub async fn find(
    State(state): State<AppState>,
    Query(params): Query<FindParams>,
) -> Result<Response, ApiError> {
    let data = FilterData {
        filter: Some(validate::json_param(params.filter.as_deref().unwrap_or("{}"), "filter")?),
        projection: Some(validate::json_param(
            params.projection.as_deref().unwrap_or("{}"),
            "projection",
        )?),
        sort: Some(validate::json_param(params.sort.as_deref().unwrap_or("{}"), "sort")?),
        limit: Some(int_param(&params.limit, 0)),
        skip: Some(int_param(&params.skip, 0)),
    };

    let result = state.articles.find_by_filter(&data).await?;
    Ok(Json(json!({
        "message": format!("Found {} articles", result.count),
        "articles": result.records.iter().map(Document::to_value).collect::<Vec<_>>(),
        "count": result.count,
        "hasMore": result.has_more,
        "pagination": {
            "limit": data.limit,
            "skip": data.skip,
            "hasMore": result.has_more,
        },
    }))
    .into_response())
}

/// GET /articles/search - free-text search, minimum query length 2.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let query = validate::search_query(params.q.as_deref().unwrap_or(""))?;
    let projection =
        validate::json_param(params.projection.as_deref().unwrap_or("{}"), "projection")?;
    let published_only = validate::bool_param(
        params.published_only.as_deref(),
        "publishedOnly",
        true,
    )?;

    let filter = published_only.then(|| WhereNode::eq("isPublished", true));
    let result = state
        .articles
        .search(
            &query,
            filter,
            int_param(&params.limit, 20),
            int_param(&params.skip, 0),
            &projection,
        )
        .await?;

    Ok(Json(json!({
        "message": format!("Found {} articles for \"{}\"", result.count, query),
        "articles": result.records.iter().map(Document::to_value).collect::<Vec<_>>(),
        "count": result.count,
    }))
    .into_response())
}

/// GET /articles/aggregated - group-by aggregation.
pub async fn aggregated(
    State(state): State<AppState>,
    Query(params): Query<AggregateParams>,
) -> Result<Response, ApiError> {
    let group_by = params.group_by.as_deref().unwrap_or("category");
    let include_stats =
        validate::bool_param(params.include_stats.as_deref(), "includeStats", true)?;

    let mut result = state.articles.aggregate(group_by, include_stats).await?;
    result["message"] = Value::from(format!("Aggregated article data by \"{}\"", group_by));
    Ok(Json(result).into_response())
}

/// GET /articles/top - ranked by views, likes or creation date.
pub async fn top(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> Result<Response, ApiError> {
    const ALLOWED: [&str; 3] = ["views", "likes", "createdAt"];
    let sort_by = params.sort_by.as_deref().unwrap_or("views");
    if !ALLOWED.contains(&sort_by) {
        return Err(ApiError::bad_request(format!(
            "Parameter sortBy must be one of: {}",
            ALLOWED.join(", ")
        )));
    }
    let published_only = validate::bool_param(
        params.published_only.as_deref(),
        "publishedOnly",
        true,
    )?;

    let docs = state
        .articles
        .top(sort_by, int_param(&params.limit, 10), published_only)
        .await?;
    Ok(Json(json!({
        "message": format!("Top {} articles by {}", docs.len(), sort_by),
        "articles": docs.iter().map(Document::to_value).collect::<Vec<_>>(),
        "count": docs.len(),
    }))
    .into_response())
}
