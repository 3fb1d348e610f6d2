use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::middleware::{accepts_html, CurrentSession, CurrentUser};
use crate::pages;

/// GET /protected - session and principal introspection for diagnostics.
pub async fn show(
    headers: HeaderMap,
    CurrentUser(principal): CurrentUser,
    CurrentSession(session): CurrentSession,
) -> Response {
    if accepts_html(&headers) {
        return pages::protected_page(&principal, &session.id, &session.expires_at.to_rfc3339())
            .into_response();
    }

    Json(json!({
        "message": "Access to protected resource granted",
        "user": principal.to_public_json(),
        "session": {
            "id": session.id,
            "authenticated": true,
            "createdAt": session.created_at,
            "expiresAt": session.expires_at,
            "timestamp": chrono::Utc::now(),
        },
    }))
    .into_response()
}
