pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{DocId, StoreError};

pub use memory::MemorySessionStore;
pub use postgres::PostgresSessionStore;

/// Server-side session record. The client only ever sees the opaque id; the
/// principal is re-resolved from the user collection on every gated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub principal_id: DocId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(principal_id: DocId, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            principal_id,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Session persistence seam. One session maps to one principal id; a
/// principal may hold any number of concurrent sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Rolling expiration: move the expiry forward.
    async fn touch(&self, id: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn destroy(&self, id: &str) -> Result<(), StoreError>;

    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

pub type SessionHandle = Arc<dyn SessionStore>;

/// Build the session cookie. HttpOnly keeps it away from page scripts;
/// SameSite=Lax matches the browser-flow redirects used after login.
pub fn session_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax{}; Max-Age={}",
        name,
        value,
        if secure { "; Secure" } else { "" },
        max_age_secs
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sessions_get_unique_opaque_ids() {
        let a = Session::new(DocId::Int(1), 60);
        let b = Session::new(DocId::Int(1), 60);
        assert_ne!(a.id, b.id);
        assert!(!a.is_expired());
    }

    #[test]
    fn ttl_in_the_past_is_expired() {
        let session = Session::new(DocId::Int(1), -10);
        assert!(session.is_expired());
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie("sessionId", "abc", 3600, false);
        assert!(cookie.starts_with("sessionId=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));

        let secure = session_cookie("sessionId", "abc", 3600, true);
        assert!(secure.contains("Secure"));

        let cleared = clear_session_cookie("sessionId");
        assert!(cleared.contains("Max-Age=0"));
    }
}
