use serde_json::Value;

use crate::repository::{Repository, Users};
use crate::store::{DocId, Document};

use super::{password, AuthError, Principal};

/// Input for registration, already syntactically validated by the handler.
/// Role is not accepted here: it is fixed at creation, default `user`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Credential verification and principal resolution against the user
/// collection.
#[derive(Clone)]
pub struct AuthService {
    users: Repository<Users>,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(users: Repository<Users>, bcrypt_cost: u32) -> Self {
        Self { users, bcrypt_cost }
    }

    /// Verify credentials. Unknown email and wrong password take the same
    /// failure path so the response cannot reveal which part was wrong.
    pub async fn authenticate(&self, email: &str, password_input: &str) -> Result<Principal, AuthError> {
        let Some(doc) = self.users.find_by_email(email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = doc.get_str("password") else {
            return Err(AuthError::InvalidCredentials);
        };

        let valid =
            password::verify_blocking(password_input.to_string(), hash.to_string()).await?;
        if !valid {
            return Err(AuthError::InvalidCredentials);
        }

        Principal::from_document(&doc).ok_or(AuthError::PrincipalNotFound)
    }

    pub async fn register(&self, new_user: NewUser) -> Result<Principal, AuthError> {
        if self.users.find_by_email(&new_user.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let hashed = password::hash_blocking(new_user.password, self.bcrypt_cost).await?;

        let mut doc = Document::new();
        doc.set("username", new_user.username);
        doc.set("email", new_user.email);
        doc.set("password", hashed);
        doc.set("role", "user");
        if let Some(first) = new_user.first_name {
            doc.set("firstName", Value::from(first));
        }
        if let Some(last) = new_user.last_name {
            doc.set("lastName", Value::from(last));
        }

        let result = self.users.insert_one(doc).await?;
        Principal::from_document(&result.record).ok_or(AuthError::PrincipalNotFound)
    }

    /// Re-fetch the principal behind a stored id. Fails when the underlying
    /// record is gone, which implicitly invalidates the session.
    pub async fn resolve(&self, id: &DocId) -> Result<Principal, AuthError> {
        let doc = self
            .users
            .get_by_id(id)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;
        Principal::from_document(&doc).ok_or(AuthError::PrincipalNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn service() -> AuthService {
        let users = Repository::new(Arc::new(MemoryStore::new()) as crate::store::StoreHandle);
        AuthService::new(users, 4)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            username: "tester".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let auth = service();
        let registered = auth.register(new_user("t@example.com")).await.unwrap();
        assert_eq!(registered.role, Role::User);

        let principal = auth.authenticate("t@example.com", "secret123").await.unwrap();
        assert_eq!(principal.email, "t@example.com");
        // Serialized principal omits the password hash entirely.
        let wire = serde_json::to_value(&principal).unwrap();
        assert!(wire.get("password").is_none());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let auth = service();
        auth.register(new_user("known@example.com")).await.unwrap();

        let wrong_password = auth
            .authenticate("known@example.com", "badpass")
            .await
            .unwrap_err();
        let unknown_email = auth
            .authenticate("nobody@example.com", "secret123")
            .await
            .unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let auth = service();
        auth.register(new_user("dup@example.com")).await.unwrap();
        let err = auth.register(new_user("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn resolve_fails_after_principal_deleted() {
        let users: Repository<Users> =
            Repository::new(Arc::new(MemoryStore::new()) as crate::store::StoreHandle);
        let auth = AuthService::new(users.clone(), 4);

        let principal = auth.register(new_user("gone@example.com")).await.unwrap();
        assert!(auth.resolve(&principal.id).await.is_ok());

        users.delete(&principal.id).await.unwrap();
        let err = auth.resolve(&principal.id).await.unwrap_err();
        assert!(matches!(err, AuthError::PrincipalNotFound));
    }
}
