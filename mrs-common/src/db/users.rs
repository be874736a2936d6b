//! Users, credential accounts and sessions

use crate::db::models::{Session, User};
use crate::ids::new_id;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

/// Provider id for email/password accounts
pub const CREDENTIAL_PROVIDER: &str = "credential";

/// Create a user together with its credential account
///
/// Runs in one transaction; a duplicate email yields `Error::Conflict`.
pub async fn create_user_with_password(
    pool: &SqlitePool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<User> {
    let mut tx = pool.begin().await?;
    let user = insert_user(&mut tx, email, name).await?;

    sqlx::query(
        r#"
        INSERT INTO accounts (id, user_id, provider_id, account_id, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id())
    .bind(&user.id)
    .bind(CREDENTIAL_PROVIDER)
    .bind(&user.id)
    .bind(password_hash)
    .bind(user.created_at)
    .bind(user.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(user)
}

async fn insert_user(conn: &mut SqliteConnection, email: &str, name: &str) -> Result<User> {
    let now = Utc::now();
    let user = User {
        id: new_id(),
        email: email.to_string(),
        name: name.to_string(),
        email_verified: false,
        image: None,
        created_at: now,
        updated_at: now,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO users (id, email, name, email_verified, image, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.email_verified)
    .bind(&user.image)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *conn)
    .await;

    match result.map_err(Error::from) {
        Ok(_) => Ok(user),
        Err(e) if e.is_unique_violation() => Err(Error::Conflict("User already exists".into())),
        Err(e) => Err(e),
    }
}

pub async fn get_user(pool: &SqlitePool, user_id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Look up a user and the stored hash of their credential account
pub async fn find_credentials(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<(User, String)>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    let hash: Option<Option<String>> = sqlx::query_scalar(
        "SELECT password_hash FROM accounts WHERE user_id = ? AND provider_id = ?",
    )
    .bind(&user.id)
    .bind(CREDENTIAL_PROVIDER)
    .fetch_optional(pool)
    .await?;

    Ok(hash.flatten().map(|h| (user, h)))
}

/// Store a new session keyed by the digest of its token
pub async fn create_session(
    pool: &SqlitePool,
    user_id: &str,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<Session> {
    let session = Session {
        id: new_id(),
        user_id: user_id.to_string(),
        expires_at,
        ip_address: ip_address.map(str::to_string),
        user_agent: user_agent.map(str::to_string),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO sessions (id, token_hash, user_id, expires_at, ip_address, user_agent, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(token_hash)
    .bind(&session.user_id)
    .bind(session.expires_at)
    .bind(&session.ip_address)
    .bind(&session.user_agent)
    .bind(session.created_at)
    .execute(pool)
    .await?;

    Ok(session)
}

/// Resolve a token digest to its (unexpired) session and user
pub async fn find_session(
    pool: &SqlitePool,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<(Session, User)>> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT id, user_id, expires_at, ip_address, user_agent, created_at FROM sessions WHERE token_hash = ?",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    if session.expires_at <= now {
        delete_session(pool, token_hash).await?;
        return Ok(None);
    }

    let user = get_user(pool, &session.user_id).await?;
    Ok(user.map(|u| (session, u)))
}

pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Remove expired sessions, returning how many were deleted
pub async fn purge_expired_sessions(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let deleted = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted)
}
