//! Minimal server-rendered HTML for browser clients. A real template engine
//! is deliberately out of scope; these mirror the inline pages the JSON API
//! sits alongside.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::auth::Principal;
use crate::store::Document;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{}</title>\n\
         <style>body{{font-family:Arial,sans-serif;margin:40px;background:#f5f5f5}}\
         .container{{max-width:720px;margin:0 auto;background:#fff;padding:30px;border-radius:8px}}\
         .error{{background:#f8d7da;color:#721c24;padding:15px;border-radius:5px}}\
         a{{color:#007bff}}</style>\n</head>\n<body>\n<div class=\"container\">\n{}\n</div>\n</body>\n</html>",
        escape(title),
        body
    )
}

pub fn login_page() -> Html<String> {
    let body = "<h1>Sign in</h1>\
        <form method=\"post\" action=\"/auth/login\">\
        <p><label>Email <input type=\"email\" name=\"email\" required></label></p>\
        <p><label>Password <input type=\"password\" name=\"password\" required></label></p>\
        <p><button type=\"submit\">Sign in</button></p>\
        </form>\
        <p>No account? <a href=\"/auth/register\">Register</a></p>";
    Html(layout("Sign in", body))
}

pub fn register_page() -> Html<String> {
    let body = "<h1>Register</h1>\
        <form method=\"post\" action=\"/auth/register\">\
        <p><label>Username <input type=\"text\" name=\"username\" required></label></p>\
        <p><label>Email <input type=\"email\" name=\"email\" required></label></p>\
        <p><label>Password <input type=\"password\" name=\"password\" required></label></p>\
        <p><button type=\"submit\">Create account</button></p>\
        </form>\
        <p>Already registered? <a href=\"/auth/login\">Sign in</a></p>";
    Html(layout("Register", body))
}

pub fn dashboard_page(principal: &Principal) -> Html<String> {
    let body = format!(
        "<h1>Dashboard</h1>\
         <p>Signed in as <strong>{}</strong> ({})</p>\
         <ul>\
         <li><a href=\"/users\">Users</a></li>\
         <li><a href=\"/articles\">Articles</a></li>\
         <li><a href=\"/protected\">Session details</a></li>\
         <li><a href=\"/settings\">Settings</a></li>\
         </ul>\
         <form method=\"post\" action=\"/auth/logout\"><button type=\"submit\">Sign out</button></form>",
        escape(&principal.username),
        escape(principal.role.as_str()),
    );
    Html(layout("Dashboard", &body))
}

pub fn welcome_page() -> Html<String> {
    let body = "<h1>Welcome</h1>\
        <p>Please <a href=\"/auth/login\">sign in</a> or <a href=\"/auth/register\">register</a>.</p>";
    Html(layout("Welcome", body))
}

pub fn profile_page(principal: Option<&Principal>) -> Html<String> {
    let body = match principal {
        Some(p) => format!(
            "<h1>Profile</h1>\
             <p>Username: {}</p><p>Email: {}</p><p>Role: {}</p>\
             <p><a href=\"/\">Home</a></p>",
            escape(&p.username),
            escape(&p.email),
            escape(p.role.as_str()),
        ),
        None => "<h1>Profile</h1><p>Not signed in.</p>\
                 <p><a href=\"/auth/login\">Sign in</a></p>"
            .to_string(),
    };
    Html(layout("Profile", &body))
}

pub fn articles_page(docs: &[Document]) -> Html<String> {
    let mut rows = String::new();
    for doc in docs {
        rows.push_str(&format!(
            "<li><a href=\"/articles/{}\">{}</a> <small>by {}</small></li>",
            escape(&doc.id().map(|id| id.to_string()).unwrap_or_default()),
            escape(doc.get_str("title").unwrap_or("(untitled)")),
            escape(doc.get_str("authorName").unwrap_or("unknown")),
        ));
    }
    let body = format!("<h1>Articles</h1><ul>{}</ul><p><a href=\"/\">Home</a></p>", rows);
    Html(layout("Articles", &body))
}

pub fn article_page(doc: &Document) -> Html<String> {
    let body = format!(
        "<h1>{}</h1>\
         <p><small>by {} in {} - {} views</small></p>\
         <div>{}</div>\
         <p><a href=\"/articles\">All articles</a></p>",
        escape(doc.get_str("title").unwrap_or("(untitled)")),
        escape(doc.get_str("authorName").unwrap_or("unknown")),
        escape(doc.get_str("category").unwrap_or("General")),
        doc.get_i64("views").unwrap_or(0),
        escape(doc.get_str("content").unwrap_or("")),
    );
    Html(layout(doc.get_str("title").unwrap_or("Article"), &body))
}

pub fn users_page(docs: &[Document]) -> Html<String> {
    let mut rows = String::new();
    for doc in docs {
        rows.push_str(&format!(
            "<li><a href=\"/users/{}\">{}</a> <small>{}</small></li>",
            escape(&doc.id().map(|id| id.to_string()).unwrap_or_default()),
            escape(doc.get_str("username").unwrap_or("(unnamed)")),
            escape(doc.get_str("role").unwrap_or("user")),
        ));
    }
    let body = format!("<h1>Users</h1><ul>{}</ul><p><a href=\"/\">Home</a></p>", rows);
    Html(layout("Users", &body))
}

pub fn user_page(doc: &Document) -> Html<String> {
    let body = format!(
        "<h1>User {}</h1>\
         <p>Email: {}</p><p>Role: {}</p>\
         <p><a href=\"/users\">All users</a></p>",
        escape(doc.get_str("username").unwrap_or("(unnamed)")),
        escape(doc.get_str("email").unwrap_or("")),
        escape(doc.get_str("role").unwrap_or("user")),
    );
    Html(layout("User", &body))
}

pub fn protected_page(principal: &Principal, session_id: &str, expires_at: &str) -> Html<String> {
    let body = format!(
        "<h1>Protected page</h1>\
         <p>User: {} ({})</p>\
         <p>Session: {}...</p>\
         <p>Expires: {}</p>\
         <p><a href=\"/\">Home</a></p>",
        escape(&principal.username),
        escape(principal.role.as_str()),
        escape(&session_id.chars().take(8).collect::<String>()),
        escape(expires_at),
    );
    Html(layout("Protected page", &body))
}

pub fn settings_page(current_theme: &str, themes: &[&str]) -> Html<String> {
    let mut options = String::new();
    for theme in themes {
        options.push_str(&format!(
            "<option value=\"{0}\"{1}>{0}</option>",
            escape(theme),
            if *theme == current_theme { " selected" } else { "" },
        ));
    }
    let body = format!(
        "<h1>Settings</h1>\
         <form method=\"post\" action=\"/settings/theme\">\
         <p><label>Theme <select name=\"theme\">{}</select></label></p>\
         <p><button type=\"submit\">Save</button></p>\
         </form>\
         <p><a href=\"/\">Home</a></p>",
        options
    );
    Html(layout("Settings", &body))
}

/// Rendered error page for browser clients; the JSON path goes through
/// ApiError instead.
pub fn error_response(status: u16, title: &str, reason: &str) -> Response {
    let body = format!(
        "<div class=\"error\"><h1>{}</h1><p>{}</p></div>\
         <p><a href=\"/\">Back to home</a></p>",
        escape(title),
        escape(reason),
    );
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Html(layout(title, &body))).into_response()
}

pub fn not_found_page() -> Response {
    error_response(404, "Not found", "The requested resource does not exist")
}
