//! Session tokens and request extractors
//!
//! A session token is 32 random bytes, base64url encoded, handed to the
//! client once. The database keeps only its SHA-256 digest. Requests present
//! the token as `Authorization: Bearer <token>` or in the `mrs_session`
//! cookie.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use mrs_common::db::models::{Session, User};
use mrs_common::db::users;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const SESSION_COOKIE: &str = "mrs_session";
const TOKEN_BYTES: usize = 32;

pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a token, the form stored in `sessions.token_hash`
pub fn hash_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

/// Bearer token first, then the session cookie
pub fn token_from_parts(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Caller with a valid, unexpired session
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session: Session,
    pub token_hash: String,
}

/// Session if present; lets handlers choose their own unauthenticated message
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    /// The user, or a 401 with `message`
    pub fn require(self, message: &str) -> ApiResult<AuthUser> {
        self.0
            .ok_or_else(|| ApiError::Unauthenticated(message.to_string()))
    }
}

async fn resolve_session(parts: &Parts, state: &AppState) -> ApiResult<Option<AuthUser>> {
    let Some(token) = token_from_parts(parts) else {
        return Ok(None);
    };

    let token_hash = hash_token(&token);
    let found = users::find_session(&state.db, &token_hash, Utc::now()).await?;
    Ok(found.map(|(session, user)| AuthUser {
        user,
        session,
        token_hash,
    }))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state)
            .await?
            .ok_or_else(ApiError::unauthorized)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(resolve_session(parts, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_bearer_token() {
        let parts = parts_with(header::AUTHORIZATION, "Bearer tok123");
        assert_eq!(token_from_parts(&parts).as_deref(), Some("tok123"));
    }

    #[test]
    fn test_cookie_token() {
        let parts = parts_with(header::COOKIE, "theme=dark; mrs_session=tok456; other=1");
        assert_eq!(token_from_parts(&parts).as_deref(), Some("tok456"));

        let parts = parts_with(header::COOKIE, "mrs_session=");
        assert_eq!(token_from_parts(&parts), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("tok", 60);
        assert!(cookie.starts_with("mrs_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
