use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Redirect, Response};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::{accepts_html, cookie_value, JsonOrForm};
use crate::pages;

/// UI preference stored client-side; unrelated to the data core.
const THEMES: [&str; 4] = ["light", "dark", "blue", "green"];
const THEME_COOKIE_MAX_AGE: i64 = 30 * 24 * 60 * 60; // 30 days

#[derive(Debug, Deserialize)]
pub struct ThemeBody {
    pub theme: Option<String>,
}

fn current_theme(headers: &HeaderMap) -> String {
    cookie_value(headers, "theme").unwrap_or_else(|| "light".to_string())
}

/// GET /settings
pub async fn index(headers: HeaderMap) -> Response {
    let theme = current_theme(&headers);
    if accepts_html(&headers) {
        pages::settings_page(&theme, &THEMES).into_response()
    } else {
        Json(json!({
            "currentTheme": theme,
            "availableThemes": THEMES,
        }))
        .into_response()
    }
}

/// POST /settings/theme - persists the choice in a client-side cookie.
pub async fn set_theme(
    headers: HeaderMap,
    JsonOrForm(body): JsonOrForm<ThemeBody>,
) -> Result<Response, ApiError> {
    let theme = body.theme.unwrap_or_default();
    if !THEMES.contains(&theme.as_str()) {
        return Err(ApiError::bad_request(format!(
            "Invalid theme. Valid themes: {}",
            THEMES.join(", ")
        )));
    }

    // Readable from page scripts on purpose, unlike the session cookie.
    let cookie = format!(
        "theme={}; Path=/; Max-Age={}; SameSite=Lax",
        theme, THEME_COOKIE_MAX_AGE
    );

    if accepts_html(&headers) {
        Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/settings")).into_response())
    } else {
        Ok((
            [(header::SET_COOKIE, cookie)],
            Json(json!({
                "success": true,
                "message": format!("Theme set to: {}", theme),
                "theme": theme,
            })),
        )
            .into_response())
    }
}

/// GET /settings/theme
pub async fn get_theme(headers: HeaderMap) -> Json<serde_json::Value> {
    Json(json!({ "theme": current_theme(&headers) }))
}
