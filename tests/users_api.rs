mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn user_listings_never_expose_password_hashes() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "walter", "walter@example.com").await;

    let response = send(&app, with_cookie(get("/users"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    for user in body["users"].as_array().unwrap() {
        assert!(user.get("password").is_none());
    }

    // The raw find path is sanitized too.
    let response = send(&app, with_cookie(get("/users/find"), &cookie)).await;
    let body = body_json(response).await;
    for user in body["users"].as_array().unwrap() {
        assert!(user.get("password").is_none(), "password leaked: {}", user);
    }
}

#[tokio::test]
async fn get_user_by_id_disambiguates_numeric_ids() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "ider", "ider@example.com").await;

    let response = send(&app, with_cookie(get("/users/1"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["id"], 1);

    let response = send(&app, with_cookie(get("/users/does-not-exist"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn insert_one_requires_identity_fields() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "maker", "maker@example.com").await;

    let response = send(
        &app,
        with_cookie(
            json_request(
                Method::POST,
                "/users/insertOne",
                &json!({ "username": "nomail" }),
            ),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        with_cookie(
            json_request(
                Method::POST,
                "/users/insertOne",
                &json!({ "username": "newbie", "email": "newbie@example.com" }),
            ),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    // Defaults stamped by the repository.
    assert_eq!(body["user"]["role"], "user");
    assert_eq!(body["user"]["isActive"], true);
}

#[tokio::test]
async fn insert_many_labels_invalid_user() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "bulker", "bulker@example.com").await;

    let response = send(
        &app,
        with_cookie(
            json_request(
                Method::POST,
                "/users/insertMany",
                &json!([
                    { "username": "good", "email": "good@example.com" },
                    { "username": "bad-email", "email": "nope" },
                ]),
            ),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("User 2"));
}

#[tokio::test]
async fn find_supports_filters_and_projections() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "finder", "finder@example.com").await;

    send(
        &app,
        with_cookie(
            json_request(
                Method::POST,
                "/users/insertMany",
                &json!([
                    { "username": "mod1", "email": "m1@example.com", "role": "moderator" },
                    { "username": "mod2", "email": "m2@example.com", "role": "moderator" },
                ]),
            ),
            &cookie,
        ),
    )
    .await;

    // {"role":"moderator"} / {"username":1}, percent-encoded for the query string
    let uri = "/users/find?filter=%7B%22role%22%3A%22moderator%22%7D&projection=%7B%22username%22%3A1%7D";
    let response = send(&app, with_cookie(get(uri), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    for user in users {
        assert!(user.get("username").is_some());
        assert!(user.get("id").is_some());
        assert!(user.get("email").is_none(), "projection leaked: {}", user);
    }
}

#[tokio::test]
async fn update_one_by_filter_returns_updated_record() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "updater", "updater@example.com").await;

    let response = send(
        &app,
        with_cookie(
            json_request(
                Method::PUT,
                "/users/updateOne",
                &json!({
                    "filter": { "username": "updater" },
                    "update": { "firstName": "Up", "lastName": "Dater" },
                }),
            ),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["matchedCount"], 1);
    assert_eq!(body["user"]["firstName"], "Up");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn delete_many_guard_rejects_null_role() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "guardian", "guardian@example.com").await;

    let response = send(
        &app,
        with_cookie(
            json_request(
                Method::DELETE,
                "/users/deleteMany",
                &json!({ "filter": { "role": null } }),
            ),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_search_enforces_minimum_query_and_strips_passwords() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "searchable", "search@example.com").await;

    let response = send(&app, with_cookie(get("/users/search?q=s"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, with_cookie(get("/users/search?q=searchable"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 1);
    assert!(body["users"][0].get("password").is_none());
}

#[tokio::test]
async fn statistics_aggregate_roles() {
    let (app, _state) = build_app();
    let cookie = register_session(&app, "stats", "stats@example.com").await;

    let response = send(&app, with_cookie(get("/users/statistics"), &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["statistics"]["totalUsers"], 1);
    assert_eq!(body["statistics"]["roleStats"]["user"], 1);
}

#[tokio::test]
async fn theme_settings_round_trip() {
    let (app, _state) = build_app();

    let response = send(
        &app,
        json_request(Method::POST, "/settings/theme", &json!({ "theme": "dark" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_from(&response);
    assert_eq!(cookie, "theme=dark");

    let response = send(&app, with_cookie(get("/settings/theme"), &cookie)).await;
    let body = body_json(response).await;
    assert_eq!(body["theme"], "dark");

    let response = send(
        &app,
        json_request(Method::POST, "/settings/theme", &json!({ "theme": "neon" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
