//! Durable job table
//!
//! Storage side of the background job queue. Jobs move
//! `queued → running → completed | failed`; a failed attempt that may be
//! retried goes back to `queued` with a later `run_at`. `run_at` is stored
//! as Unix milliseconds so readiness is a plain integer comparison.

use crate::ids::new_id;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: String,
    pub kind: String,
    pub payload: String,
    pub project_id: Option<String>,
    pub parent_id: Option<String>,
    pub status: JobStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    pub run_at: i64,
    pub last_error: Option<String>,
    pub output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.payload)
    }

    pub fn output_json(&self) -> Option<serde_json::Value> {
        self.output.as_deref().and_then(|o| serde_json::from_str(o).ok())
    }
}

/// Job about to be enqueued
#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: String,
    pub payload: serde_json::Value,
    pub project_id: Option<String>,
    pub parent_id: Option<String>,
    pub max_attempts: i64,
}

pub async fn insert_job<'e, E: SqliteExecutor<'e>>(db: E, new_job: &NewJob) -> Result<Job> {
    let now = Utc::now();
    let job = Job {
        id: new_id(),
        kind: new_job.kind.clone(),
        payload: new_job.payload.to_string(),
        project_id: new_job.project_id.clone(),
        parent_id: new_job.parent_id.clone(),
        status: JobStatus::Queued,
        attempts: 0,
        max_attempts: new_job.max_attempts.max(1),
        run_at: now.timestamp_millis(),
        last_error: None,
        output: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO jobs (id, kind, payload, project_id, parent_id, status, attempts, max_attempts,
                          run_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&job.id)
    .bind(&job.kind)
    .bind(&job.payload)
    .bind(&job.project_id)
    .bind(&job.parent_id)
    .bind(job.status)
    .bind(job.attempts)
    .bind(job.max_attempts)
    .bind(job.run_at)
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(db)
    .await?;

    Ok(job)
}

/// Atomically move the next ready job to `running`
///
/// The single UPDATE … RETURNING statement guarantees two workers never
/// claim the same row.
pub async fn claim_next(pool: &SqlitePool, now_ms: i64) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(
        r#"
        UPDATE jobs
        SET status = 'running', attempts = attempts + 1, updated_at = ?
        WHERE id = (
            SELECT id FROM jobs
            WHERE status = 'queued' AND run_at <= ?
            ORDER BY run_at, created_at
            LIMIT 1
        )
        RETURNING *
        "#,
    )
    .bind(Utc::now())
    .bind(now_ms)
    .fetch_optional(pool)
    .await?;
    Ok(job)
}

pub async fn mark_completed(pool: &SqlitePool, job_id: &str, output: &serde_json::Value) -> Result<()> {
    sqlx::query(
        "UPDATE jobs SET status = 'completed', output = ?, last_error = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(output.to_string())
    .bind(Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Terminal failure: no further attempts
pub async fn mark_failed(pool: &SqlitePool, job_id: &str, error: &str) -> Result<()> {
    sqlx::query("UPDATE jobs SET status = 'failed', last_error = ?, updated_at = ? WHERE id = ?")
        .bind(error)
        .bind(Utc::now())
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Put a job back in the queue for another attempt at `run_at_ms`
pub async fn reschedule(pool: &SqlitePool, job_id: &str, error: &str, run_at_ms: i64) -> Result<()> {
    sqlx::query(
        "UPDATE jobs SET status = 'queued', last_error = ?, run_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(error)
    .bind(run_at_ms)
    .bind(Utc::now())
    .bind(job_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_job(pool: &SqlitePool, job_id: &str) -> Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
    Ok(job)
}

/// Jobs fanned out from `parent_id`
pub async fn list_children(pool: &SqlitePool, parent_id: &str) -> Result<Vec<Job>> {
    let jobs = sqlx::query_as::<_, Job>(
        "SELECT * FROM jobs WHERE parent_id = ? ORDER BY created_at",
    )
    .bind(parent_id)
    .fetch_all(pool)
    .await?;
    Ok(jobs)
}

/// Error recorded on a job whose final attempt was cut short
pub const INTERRUPTED_ERROR: &str = "Interrupted during its final attempt";

/// What [`recover_running`] did with the jobs it found
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredJobs {
    pub requeued: u64,
    pub failed: u64,
}

/// Settle jobs left in `running` by a process that died mid-attempt
///
/// `attempts` is counted at claim time, so a job interrupted on its last
/// allowed attempt is failed rather than requeued. A job that takes the
/// process down every time it runs stops after `max_attempts` restarts.
pub async fn recover_running(pool: &SqlitePool) -> Result<RecoveredJobs> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let failed = sqlx::query(
        r#"
        UPDATE jobs SET status = 'failed', last_error = ?, updated_at = ?
        WHERE status = 'running' AND attempts >= max_attempts
        "#,
    )
    .bind(INTERRUPTED_ERROR)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let requeued = sqlx::query(
        "UPDATE jobs SET status = 'queued', run_at = ?, updated_at = ? WHERE status = 'running'",
    )
    .bind(now.timestamp_millis())
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(RecoveredJobs { requeued, failed })
}
