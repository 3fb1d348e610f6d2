mod common;

use axum::http::{header, Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn unauthenticated_users_request_gets_json_401() {
    let (app, _state) = build_app();

    let response = send(&app, get("/users")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unauthenticated_browser_request_redirects_to_login() {
    let (app, _state) = build_app();

    let response = send(&app, get_html("/users")).await;
    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/auth/login"
    );
}

#[tokio::test]
async fn non_admin_cannot_write_articles() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "plainuser", "plain@example.com").await;

    let response = send(
        &app,
        with_cookie(
            json_request(
                Method::POST,
                "/articles",
                &json!({ "title": "A valid title", "content": "Long enough article content" }),
            ),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_write_articles() {
    let (app, state) = build_app();
    let cookie = admin_session(&app, &state).await;

    let response = send(
        &app,
        with_cookie(
            json_request(
                Method::POST,
                "/articles",
                &json!({ "title": "A valid title", "content": "Long enough article content" }),
            ),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "created");
}

#[tokio::test]
async fn users_family_requires_session_but_not_admin() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "reader", "reader@example.com").await;

    let response = send(&app, with_cookie(get("/users"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_route_introspects_session() {
    let (app, _state) = build_app();

    // Gated: no session means 401.
    let response = send(&app, get("/protected")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let cookie = register_session(&app, "inspect", "inspect@example.com").await;
    let response = send(&app, with_cookie(get("/protected"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["username"], "inspect");
    assert_eq!(body["session"]["authenticated"], true);
    assert!(body["session"]["expiresAt"].is_string());
}

#[tokio::test]
async fn session_dies_with_its_principal() {
    let (app, state) = build_app();
    let cookie = register_session(&app, "ghost", "ghost@example.com").await;

    // Confirm the session works, then delete the underlying user record.
    let response = send(&app, with_cookie(get("/protected"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let doc = state.users.find_by_email("ghost@example.com").await.unwrap().unwrap();
    state.users.delete(&doc.id().unwrap()).await.unwrap();

    let response = send(&app, with_cookie(get("/protected"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rolling_session_touch_extends_expiry() {
    let (app, state) = build_app();
    let cookie = register_session(&app, "roller", "roller@example.com").await;
    let session_id = cookie.strip_prefix("sessionId=").unwrap().to_string();

    let before = state.sessions.get(&session_id).await.unwrap().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let response = send(&app, with_cookie(get("/users"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let after = state.sessions.get(&session_id).await.unwrap().unwrap();
    assert!(after.expires_at > before.expires_at);
}

#[tokio::test]
async fn public_routes_need_no_session() {
    let (app, _state) = build_app();

    assert_eq!(send(&app, get("/")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, get("/health")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, get("/settings")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, get("/auth/login")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _state) = build_app();
    let response = send(&app, get("/no/such/route")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
