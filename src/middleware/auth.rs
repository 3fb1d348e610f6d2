use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Duration, Utc};

use crate::auth::{AuthError, Principal};
use crate::config;
use crate::error::ApiError;
use crate::pages;
use crate::session::Session;
use crate::AppState;

use super::negotiate;

/// Resolved principal for the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Principal);

/// The session record backing the current request.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Global layer: resolve the session cookie into request extensions. Never
/// rejects; gated routes enforce presence via `require_session`.
pub async fn identify(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let cookie_name = &config::config().session.cookie_name;
    if let Some(session_id) = negotiate::cookie_value(request.headers(), cookie_name) {
        match resolve_session(&state, &session_id).await {
            Ok(Some((session, principal))) => {
                request.extensions_mut().insert(CurrentSession(session));
                request.extensions_mut().insert(CurrentUser(principal));
            }
            Ok(None) => {}
            Err(e) => {
                // A store outage must not break public routes.
                tracing::error!("session resolution failed: {}", e);
            }
        }
    }
    next.run(request).await
}

/// Session gate: {No Session, Invalid/Expired, Valid}. Only Valid passes; on
/// success the session expiry is extended (rolling window) regardless of the
/// handler's outcome.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(CurrentSession(session)) = request.extensions().get::<CurrentSession>().cloned()
    else {
        return unauthenticated(request.headers());
    };

    let session_config = &config::config().session;
    if session_config.rolling {
        let expires_at = Utc::now() + Duration::seconds(session_config.ttl_secs);
        if let Err(e) = state.sessions.touch(&session.id, expires_at).await {
            tracing::error!("session touch failed: {}", e);
        }
    }

    next.run(request).await
}

/// Role gate, applied after the session gate: exact admin match.
pub async fn require_admin(request: Request, next: Next) -> Response {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .map(|CurrentUser(principal)| principal.role.is_admin())
        .unwrap_or(false);

    if is_admin {
        next.run(request).await
    } else {
        forbidden(request.headers())
    }
}

async fn resolve_session(
    state: &AppState,
    session_id: &str,
) -> Result<Option<(Session, Principal)>, AuthError> {
    let Some(session) = state.sessions.get(session_id).await? else {
        return Ok(None);
    };

    if session.is_expired() {
        let _ = state.sessions.destroy(session_id).await;
        return Ok(None);
    }

    match state.auth.resolve(&session.principal_id).await {
        Ok(principal) => Ok(Some((session, principal))),
        Err(AuthError::PrincipalNotFound) => {
            // The user record is gone; the session is implicitly invalid.
            let _ = state.sessions.destroy(session_id).await;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn unauthenticated(headers: &HeaderMap) -> Response {
    if negotiate::accepts_html(headers) {
        Redirect::to("/auth/login").into_response()
    } else {
        ApiError::unauthorized("Access denied: authentication required").into_response()
    }
}

fn forbidden(headers: &HeaderMap) -> Response {
    if negotiate::accepts_html(headers) {
        pages::error_response(403, "Access denied", "Administrator privileges are required")
    } else {
        ApiError::forbidden("Administrator privileges required").into_response()
    }
}
