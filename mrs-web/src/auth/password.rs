//! Argon2id password hashing
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{ApiError, ApiResult};

pub const MIN_PASSWORD_LEN: usize = 8;

fn hash_blocking(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))
}

fn verify_blocking(password: &str, hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ApiError::Internal(format!("Invalid password hash format: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ApiError::Internal(format!("Password verification failed: {e}"))),
    }
}

pub async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_blocking(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {e}")))?
}

pub async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_blocking(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Verification task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("correct horse".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong horse".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_salts_differ() {
        let a = hash_password("same".to_string()).await.unwrap();
        let b = hash_password("same".to_string()).await.unwrap();
        assert_ne!(a, b);
    }
}
