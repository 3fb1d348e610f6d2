pub mod articles;
pub mod auth;
pub mod home;
pub mod protected;
pub mod settings;
pub mod users;

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::{accepts_html, CurrentUser};
use crate::pages;

/// Fallback identity for unauthenticated writes; enrichment never rejects.
pub(crate) const DEFAULT_AUTHOR_ID: i64 = 1;
pub(crate) const DEFAULT_AUTHOR_NAME: &str = "Unknown Author";

/// Author attribution from the acting principal, with the fixed fallback.
pub(crate) fn author_info(user: &Option<CurrentUser>) -> (Value, String) {
    match user {
        Some(CurrentUser(principal)) => {
            let name = principal.display_name();
            let name = if name.is_empty() {
                DEFAULT_AUTHOR_NAME.to_string()
            } else {
                name
            };
            (principal.id.to_value(), name)
        }
        None => (json!(DEFAULT_AUTHOR_ID), DEFAULT_AUTHOR_NAME.to_string()),
    }
}

pub(crate) fn negotiated_not_found(headers: &HeaderMap, message: &str) -> Response {
    if accepts_html(headers) {
        pages::not_found_page()
    } else {
        ApiError::not_found(message).into_response()
    }
}
