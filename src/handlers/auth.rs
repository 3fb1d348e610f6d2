use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Deserialize;
use serde_json::json;

use crate::auth::service::NewUser;
use crate::auth::{AuthError, Principal};
use crate::config;
use crate::error::ApiError;
use crate::middleware::{accepts_html, CurrentSession, CurrentUser, JsonOrForm};
use crate::pages;
use crate::session::{clear_session_cookie, session_cookie, Session};
use crate::validate;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// GET /auth/login
pub async fn login_form(headers: HeaderMap) -> Response {
    if accepts_html(&headers) {
        pages::login_page().into_response()
    } else {
        Json(json!({
            "message": "Sign in",
            "method": "POST /auth/login",
            "fields": ["email", "password"],
        }))
        .into_response()
    }
}

/// GET /auth/register
pub async fn register_form(headers: HeaderMap) -> Response {
    if accepts_html(&headers) {
        pages::register_page().into_response()
    } else {
        Json(json!({
            "message": "Register",
            "method": "POST /auth/register",
            "fields": ["username", "email", "password"],
        }))
        .into_response()
    }
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(payload): JsonOrForm<LoginRequest>,
) -> Result<Response, ApiError> {
    let email = payload.email.as_deref().unwrap_or("").trim().to_string();
    let password = payload.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    match state.auth.authenticate(&email, &password).await {
        Ok(principal) => {
            establish_session(&state, principal, &headers, StatusCode::OK, "Login successful").await
        }
        Err(AuthError::InvalidCredentials) if accepts_html(&headers) => Ok(pages::error_response(
            401,
            "Login failed",
            "Invalid email or password",
        )),
        Err(e) => Err(e.into()),
    }
}

/// POST /auth/register - creates the account and signs it in.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(payload): JsonOrForm<RegisterRequest>,
) -> Result<Response, ApiError> {
    let username = validate::username(payload.username.as_deref().unwrap_or(""))?;
    let email = validate::email(payload.email.as_deref().unwrap_or(""))?;
    let password = payload.password.unwrap_or_default();
    validate::password(&password)?;

    let new_user = NewUser {
        username,
        email,
        password,
        first_name: payload.first_name.filter(|s| !s.trim().is_empty()),
        last_name: payload.last_name.filter(|s| !s.trim().is_empty()),
    };

    match state.auth.register(new_user).await {
        Ok(principal) => {
            establish_session(
                &state,
                principal,
                &headers,
                StatusCode::CREATED,
                "Registration successful",
            )
            .await
        }
        Err(AuthError::DuplicateEmail) if accepts_html(&headers) => Ok(pages::error_response(
            409,
            "Registration failed",
            "A user with this email already exists",
        )),
        Err(e) => Err(e.into()),
    }
}

/// POST /auth/logout - destroys the server-side session and clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    session: Option<CurrentSession>,
) -> Result<Response, ApiError> {
    if let Some(CurrentSession(session)) = session {
        state.sessions.destroy(&session.id).await.map_err(ApiError::from)?;
    }

    let cookie = clear_session_cookie(&config::config().session.cookie_name);
    if accepts_html(&headers) {
        Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
    } else {
        Ok((
            [(header::SET_COOKIE, cookie)],
            Json(json!({ "message": "Logout successful" })),
        )
            .into_response())
    }
}

/// GET /auth/profile
pub async fn profile(headers: HeaderMap, user: Option<CurrentUser>) -> Response {
    let principal = user.map(|CurrentUser(p)| p);
    if accepts_html(&headers) {
        pages::profile_page(principal.as_ref()).into_response()
    } else {
        Json(json!({
            "user": principal.map(|p| p.to_public_json()),
        }))
        .into_response()
    }
}

async fn establish_session(
    state: &AppState,
    principal: Principal,
    headers: &HeaderMap,
    status: StatusCode,
    message: &str,
) -> Result<Response, ApiError> {
    let session_config = &config::config().session;
    let session = Session::new(principal.id.clone(), session_config.ttl_secs);
    state.sessions.insert(session.clone()).await.map_err(ApiError::from)?;

    let cookie = session_cookie(
        &session_config.cookie_name,
        &session.id,
        session_config.ttl_secs,
        config::config().security.cookie_secure,
    );

    if accepts_html(headers) {
        Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
    } else {
        Ok((
            status,
            [(header::SET_COOKIE, cookie)],
            Json(json!({
                "message": message,
                "user": principal.to_public_json(),
            })),
        )
            .into_response())
    }
}
