//! Demo data loading for the `seed` subcommand.

use anyhow::Result;
use serde_json::{json, Value};

use crate::auth::password;
use crate::config;
use crate::store::Document;
use crate::AppState;

/// Insert the demo accounts and a handful of articles. Idempotent: bails out
/// when the admin account already exists.
pub async fn run(state: &AppState) -> Result<()> {
    if state.users.find_by_email("admin@example.com").await?.is_some() {
        tracing::info!("store already seeded, nothing to do");
        return Ok(());
    }

    let cost = config::config().security.bcrypt_cost;
    let admin_hash = password::hash_blocking("admin123".to_string(), cost).await?;
    let user_hash = password::hash_blocking("user123".to_string(), cost).await?;

    let users = state
        .users
        .insert_many(vec![
            user_doc("admin", "admin@example.com", &admin_hash, "admin"),
            user_doc("user", "user@example.com", &user_hash, "user"),
        ])
        .await?;
    tracing::info!("seeded {} users", users.inserted_count);

    let admin_id = users.records[0]
        .id()
        .map(|id| id.to_value())
        .unwrap_or(Value::from(1));

    let articles = state
        .articles
        .insert_many(vec![
            article_doc(
                "Getting started",
                "A short tour of the platform: accounts, sessions and the article \
                 collections, with pointers to the query endpoints.",
                &admin_id,
                "admin",
                "General",
                &["intro"],
            ),
            article_doc(
                "Filtering and projections",
                "The find endpoints accept Mongo-style filter, projection and sort \
                 parameters encoded as JSON in the query string.",
                &admin_id,
                "admin",
                "Tech",
                &["queries", "howto"],
            ),
            article_doc(
                "Bulk operations",
                "insertMany, updateMany and deleteMany operate on whole filter \
                 matches and report matched and modified counts.",
                &admin_id,
                "admin",
                "Tech",
                &["bulk"],
            ),
        ])
        .await?;
    tracing::info!("seeded {} articles", articles.inserted_count);

    Ok(())
}

fn user_doc(username: &str, email: &str, password_hash: &str, role: &str) -> Document {
    let mut doc = Document::new();
    doc.set("username", username);
    doc.set("email", email);
    doc.set("password", password_hash);
    doc.set("role", role);
    doc
}

fn article_doc(
    title: &str,
    content: &str,
    author_id: &Value,
    author_name: &str,
    category: &str,
    tags: &[&str],
) -> Document {
    let mut doc = Document::new();
    doc.set("title", title);
    doc.set("content", content);
    doc.set("authorId", author_id.clone());
    doc.set("authorName", author_name);
    doc.set("category", category);
    doc.set("tags", json!(tags));
    doc
}
