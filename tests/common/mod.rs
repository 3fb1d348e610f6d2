//! Shared harness: build the full router on the in-memory store and drive it
//! with oneshot requests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

use scriptum::auth::password;
use scriptum::session::MemorySessionStore;
use scriptum::store::{Document, MemoryStore};
use scriptum::AppState;

pub fn build_app() -> (Router, AppState) {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemorySessionStore::new()),
    );
    (scriptum::app(state.clone()), state)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<axum::body::Body> {
    app.clone().oneshot(request).await.expect("request failed")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap()
}

pub fn get_html(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::ACCEPT, "text/html")
        .body(Body::empty())
        .unwrap()
}

pub fn with_cookie(mut request: Request<Body>, cookie: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    request
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<axum::body::Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read failed");
    serde_json::from_slice(&bytes).expect("body was not JSON")
}

/// Extract the `name=value` pair from a Set-Cookie header.
pub fn cookie_from(response: &Response<axum::body::Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie header")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

/// Register a fresh account through the API and return its session cookie.
pub async fn register_session(app: &Router, username: &str, email: &str) -> String {
    let response = send(
        app,
        json_request(
            Method::POST,
            "/auth/register",
            &serde_json::json!({
                "username": username,
                "email": email,
                "password": "secret123",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED, "registration failed");
    cookie_from(&response)
}

/// Insert an admin account directly into the store (registration never grants
/// admin) and log it in through the API.
pub async fn admin_session(app: &Router, state: &AppState) -> String {
    let hash = password::hash("admin123", 4).unwrap();
    let mut doc = Document::new();
    doc.set("username", "admin");
    doc.set("email", "admin@example.com");
    doc.set("password", hash);
    doc.set("role", "admin");
    state.users.insert_one(doc).await.unwrap();

    let response = send(
        app,
        json_request(
            Method::POST,
            "/auth/login",
            &serde_json::json!({ "email": "admin@example.com", "password": "admin123" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "admin login failed");
    cookie_from(&response)
}
