//! Database schema migrations
//!
//! Tables are created with their current shape by `init::create_schema`,
//! which is schema version 1. Later schema changes are added here as
//! ordered steps that bring older databases up to date. Each step is
//! idempotent and checks before altering.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations**
//! 2. **Always add new migrations** as `if current_version < N` steps in
//!    `run_migrations` and bump `CURRENT_SCHEMA_VERSION`
//! 3. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Schema version created by `init::create_schema`
pub const BASE_SCHEMA_VERSION: i32 = 1;

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = BASE_SCHEMA_VERSION;

/// Get current schema version from database (0 when never stamped)
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// Run all pending migrations
///
/// Must run after `init::create_schema`. An unstamped database has just
/// been given the base schema and is stamped with it.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let mut current_version = get_schema_version(pool).await?;

    if current_version == 0 {
        set_schema_version(pool, BASE_SCHEMA_VERSION).await?;
        current_version = BASE_SCHEMA_VERSION;
        info!("Stamped new database with schema v{}", current_version);
    }

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    info!("All migrations completed successfully");
    Ok(())
}
