//! Settings table accessors
//!
//! Key/value runtime settings. Secrets stored here take priority over
//! environment variables and the TOML file.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

pub const OPENAI_API_KEY: &str = "openai_api_key";
pub const ANTHROPIC_API_KEY: &str = "anthropic_api_key";
pub const ANALYSIS_WEBHOOK_URL: &str = "analysis_webhook_url";
pub const JOB_MAX_ATTEMPTS: &str = "job_max_attempts";
pub const JOB_RETRY_BASE_MS: &str = "job_retry_base_ms";
pub const DATABASE_MAX_LOCK_WAIT_MS: &str = "database_max_lock_wait_ms";

/// Get a setting value (None when missing or NULL)
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;
    Ok(value.flatten())
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Numeric setting with fallback when missing or unparseable
pub async fn get_u64(pool: &SqlitePool, key: &str, default: u64) -> Result<u64> {
    Ok(get_setting(pool, key)
        .await?
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default))
}

/// Seed defaults for tunables (never overwrites an existing value)
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, JOB_MAX_ATTEMPTS, "3").await?;
    ensure_setting(pool, JOB_RETRY_BASE_MS, "2000").await?;
    ensure_setting(pool, DATABASE_MAX_LOCK_WAIT_MS, "5000").await?;
    Ok(())
}

async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    // Present but NULL: reset to default
    sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}
