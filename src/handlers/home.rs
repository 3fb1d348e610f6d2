use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::middleware::{accepts_html, CurrentUser};
use crate::pages;
use crate::AppState;

use super::negotiated_not_found;

/// GET / - dashboard for authenticated users, sign-in prompt otherwise.
pub async fn index(headers: HeaderMap, user: Option<CurrentUser>) -> Response {
    if accepts_html(&headers) {
        return match user {
            Some(CurrentUser(principal)) => pages::dashboard_page(&principal).into_response(),
            None => pages::welcome_page().into_response(),
        };
    }

    match user {
        Some(CurrentUser(principal)) => Json(json!({
            "message": "Dashboard",
            "user": principal.to_public_json(),
        }))
        .into_response(),
        None => Json(json!({
            "message": "Authentication required",
            "endpoints": {
                "login": "POST /auth/login",
                "register": "POST /auth/register",
            },
        }))
        .into_response(),
    }
}

/// GET /health - liveness plus a store ping.
pub async fn health(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();
    match state.store.ping().await {
        Ok(_) => Json(json!({
            "status": "ok",
            "timestamp": now,
            "store": "ok",
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "store": "unavailable",
                })),
            )
                .into_response()
        }
    }
}

/// Catch-all for unknown routes.
pub async fn fallback(headers: HeaderMap) -> Response {
    negotiated_not_found(&headers, "Not Found")
}
