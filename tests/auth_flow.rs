mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn register_login_logout_cycle() {
    let (app, _state) = build_app();

    let cookie = register_session(&app, "alice", "alice@example.com").await;

    // Session cookie resolves to the principal.
    let response = send(&app, with_cookie(get("/auth/profile"), &cookie)).await;
    let body = body_json(response).await;
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["role"], "user");

    // Logout destroys the server-side session.
    let response = send(
        &app,
        with_cookie(json_request(Method::POST, "/auth/logout", &json!({})), &cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The old cookie no longer opens gated routes.
    let response = send(&app, with_cookie(get("/users"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_cookie_and_reports_user() {
    let (app, _state) = build_app();
    register_session(&app, "bob", "bob@example.com").await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            &json!({ "email": "bob@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_from(&response);
    assert!(cookie.starts_with("sessionId="));

    let body = body_json(response).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["email"], "bob@example.com");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn invalid_credentials_report_identically() {
    let (app, _state) = build_app();
    register_session(&app, "carol", "carol@example.com").await;

    let wrong_password = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            &json!({ "email": "carol@example.com", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let wrong_password = body_json(wrong_password).await;

    let unknown_email = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            &json!({ "email": "nobody@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    let unknown_email = body_json(unknown_email).await;

    assert_eq!(wrong_password["error"], unknown_email["error"]);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let (app, _state) = build_app();
    register_session(&app, "dora", "dora@example.com").await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            &json!({ "username": "dora2", "email": "dora@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_input_is_validated() {
    let (app, _state) = build_app();

    let bad_email = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            &json!({ "username": "validname", "email": "not-an-email", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let short_username = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            &json!({ "username": "ab", "email": "ok@example.com", "password": "secret123" }),
        ),
    )
    .await;
    assert_eq!(short_username.status(), StatusCode::BAD_REQUEST);

    let short_password = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            &json!({ "username": "validname", "email": "ok@example.com", "password": "abc" }),
        ),
    )
    .await;
    assert_eq!(short_password.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_without_session_is_null() {
    let (app, _state) = build_app();
    let response = send(&app, get("/auth/profile")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["user"].is_null());
}
