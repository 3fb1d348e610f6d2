//! Password hashing and verification (bcrypt, salted, one-way).

use super::AuthError;

pub fn hash(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Hashing(e.to_string()))
}

/// A malformed stored hash verifies as false rather than erroring; the caller
/// reports the same invalid-credentials failure either way.
pub fn verify(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Hash on a blocking thread; bcrypt is deliberately slow.
pub async fn hash_blocking(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash(&password, cost))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
}

pub async fn verify_blocking(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify(&password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))
}
