pub mod password;
pub mod service;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::store::{DocId, Document, StoreError};

pub use service::AuthService;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email and wrong password report identically.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("A user with this email already exists")]
    DuplicateEmail,

    /// The session points at a user record that no longer exists.
    #[error("Session principal no longer exists")]
    PrincipalNotFound,

    #[error("Hashing failure: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Moderator,
    User,
    Guest,
}

impl Role {
    pub fn parse(raw: &str) -> Role {
        match raw {
            "admin" => Role::Admin,
            "editor" => Role::Editor,
            "moderator" => Role::Moderator,
            "user" => Role::User,
            _ => Role::Guest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Moderator => "moderator",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// An authenticated identity. Built from a user document with the password
/// hash left behind, so a Principal can never leak it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: DocId,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub active: bool,
}

impl Principal {
    pub fn from_document(doc: &Document) -> Option<Principal> {
        let id = doc.id()?;
        let email = doc.get_str("email")?.to_string();
        Some(Principal {
            id,
            email,
            username: doc.get_str("username").unwrap_or_default().to_string(),
            role: Role::parse(doc.get_str("role").unwrap_or("user")),
            first_name: doc.get_str("firstName").map(str::to_string),
            last_name: doc.get_str("lastName").map(str::to_string),
            active: doc.get("isActive").and_then(Value::as_bool).unwrap_or(true),
        })
    }

    /// Name used when attributing content: full name when present, otherwise
    /// the username.
    pub fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    /// Compact wire form used by session/profile responses.
    pub fn to_public_json(&self) -> Value {
        json!({
            "id": self.id.to_value(),
            "username": self.username,
            "email": self.email,
            "role": self.role.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn principal_never_carries_password() {
        let doc = Document::from_value(json!({
            "id": 1,
            "username": "admin",
            "email": "admin@example.com",
            "password": "$2b$10$secret",
            "role": "admin",
        }));
        let principal = Principal::from_document(&doc).unwrap();
        let serialized = serde_json::to_string(&principal).unwrap();
        assert!(!serialized.contains("secret"));
        assert!(!serialized.contains("password"));
        assert!(principal.role.is_admin());
    }

    #[test]
    fn unknown_roles_degrade_to_guest() {
        assert_eq!(Role::parse("superuser"), Role::Guest);
        assert_eq!(Role::parse("editor"), Role::Editor);
    }

    #[test]
    fn display_name_prefers_full_name() {
        let doc = Document::from_value(json!({
            "id": 2,
            "username": "jdoe",
            "email": "j@example.com",
            "firstName": "Jane",
            "lastName": "Doe",
        }));
        let principal = Principal::from_document(&doc).unwrap();
        assert_eq!(principal.display_name(), "Jane Doe");

        let doc = Document::from_value(json!({ "id": 3, "username": "solo", "email": "s@example.com" }));
        assert_eq!(Principal::from_document(&doc).unwrap().display_name(), "solo");
    }
}
