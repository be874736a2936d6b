//! Job queue over the durable `jobs` table
//!
//! Enqueueing wakes an idle worker through a shared [`Notify`]; workers
//! also poll, so jobs whose backoff expires are picked up without a wake-up.

use chrono::Utc;
use mrs_common::db::jobs::{self, Job, NewJob, RecoveredJobs};
use mrs_common::db::retry::retry_on_lock;
use mrs_common::db::settings;
use mrs_common::events::{EventBus, MrsEvent};
use mrs_common::Result;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

use super::{JobKind, TaskError};

const DEFAULT_MAX_ATTEMPTS: u64 = 3;
const DEFAULT_RETRY_BASE_MS: u64 = 2000;
const DEFAULT_LOCK_WAIT_MS: u64 = 5000;
const MAX_RETRY_DELAY_MS: u64 = 5 * 60 * 1000;

#[derive(Clone)]
pub struct JobQueue {
    db: SqlitePool,
    event_bus: EventBus,
    notify: Arc<Notify>,
    lock_wait_ms: u64,
}

/// Delay before attempt `attempts + 1`: `base * 2^(attempts - 1)`, capped
pub fn retry_delay_ms(base_ms: u64, attempts: i64) -> u64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 20) as u32;
    base_ms
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(MAX_RETRY_DELAY_MS)
}

impl JobQueue {
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        Self {
            db,
            event_bus,
            notify: Arc::new(Notify::new()),
            lock_wait_ms: DEFAULT_LOCK_WAIT_MS,
        }
    }

    /// Override how long writes wait out `SQLITE_BUSY`
    pub fn with_lock_wait(mut self, lock_wait_ms: u64) -> Self {
        self.lock_wait_ms = lock_wait_ms;
        self
    }

    async fn max_attempts(&self) -> Result<i64> {
        let max = settings::get_u64(&self.db, settings::JOB_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS).await?;
        Ok(max.max(1) as i64)
    }

    /// Backoff base; an unreadable setting must not leave the job `running`
    async fn retry_base_ms(&self) -> u64 {
        settings::get_u64(&self.db, settings::JOB_RETRY_BASE_MS, DEFAULT_RETRY_BASE_MS)
            .await
            .unwrap_or_else(|e| {
                warn!("Failed to read {}, using default: {}", settings::JOB_RETRY_BASE_MS, e);
                DEFAULT_RETRY_BASE_MS
            })
    }

    fn announce(&self, job: &Job) {
        info!(job_id = %job.id, kind = %job.kind, "Job queued");
        self.event_bus.emit_lossy(MrsEvent::JobQueued {
            job_id: job.id.clone(),
            kind: job.kind.clone(),
            project_id: job.project_id.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        });
        self.notify.notify_one();
    }

    pub async fn enqueue(
        &self,
        kind: JobKind,
        payload: Value,
        project_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Job> {
        let new_job = NewJob {
            kind: kind.as_str().to_string(),
            payload,
            project_id: Some(project_id.to_string()),
            parent_id: parent_id.map(str::to_string),
            max_attempts: self.max_attempts().await?,
        };

        let job = retry_on_lock("enqueue job", self.lock_wait_ms, || {
            jobs::insert_job(&self.db, &new_job)
        })
        .await?;
        self.announce(&job);
        Ok(job)
    }

    /// Fan out one job per payload under `parent_id`, all in one transaction
    pub async fn enqueue_batch(
        &self,
        kind: JobKind,
        payloads: Vec<Value>,
        project_id: &str,
        parent_id: &str,
    ) -> Result<Vec<Job>> {
        let max_attempts = self.max_attempts().await?;
        let mut tx = self.db.begin().await?;

        let mut created = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let new_job = NewJob {
                kind: kind.as_str().to_string(),
                payload,
                project_id: Some(project_id.to_string()),
                parent_id: Some(parent_id.to_string()),
                max_attempts,
            };
            created.push(jobs::insert_job(&mut *tx, &new_job).await?);
        }
        tx.commit().await?;

        for job in &created {
            self.announce(job);
        }
        Ok(created)
    }

    /// Claim the next ready job, if any
    pub async fn claim_next(&self) -> Result<Option<Job>> {
        retry_on_lock("claim job", self.lock_wait_ms, || {
            jobs::claim_next(&self.db, Utc::now().timestamp_millis())
        })
        .await
    }

    pub async fn complete(&self, job: &Job, output: &Value) -> Result<()> {
        retry_on_lock("complete job", self.lock_wait_ms, || {
            jobs::mark_completed(&self.db, &job.id, output)
        })
        .await?;

        self.event_bus.emit_lossy(MrsEvent::JobCompleted {
            job_id: job.id.clone(),
            kind: job.kind.clone(),
            project_id: job.project_id.clone().unwrap_or_default(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Record a failed attempt; returns whether the job will run again
    ///
    /// `job.attempts` already counts the attempt that just failed.
    pub async fn fail(&self, job: &Job, error: &TaskError) -> Result<bool> {
        let message = error.to_string();
        let will_retry = error.is_retryable() && job.attempts < job.max_attempts;

        if will_retry {
            let delay = retry_delay_ms(self.retry_base_ms().await, job.attempts);
            let run_at = Utc::now().timestamp_millis() + delay as i64;
            retry_on_lock("reschedule job", self.lock_wait_ms, || {
                jobs::reschedule(&self.db, &job.id, &message, run_at)
            })
            .await?;
            warn!(
                job_id = %job.id,
                kind = %job.kind,
                attempt = job.attempts,
                retry_in_ms = delay,
                "Job attempt failed, retrying: {}",
                message
            );
        } else {
            retry_on_lock("fail job", self.lock_wait_ms, || {
                jobs::mark_failed(&self.db, &job.id, &message)
            })
            .await?;
            warn!(
                job_id = %job.id,
                kind = %job.kind,
                attempt = job.attempts,
                "Job failed permanently: {}",
                message
            );
        }

        self.event_bus.emit_lossy(MrsEvent::JobFailed {
            job_id: job.id.clone(),
            kind: job.kind.clone(),
            project_id: job.project_id.clone().unwrap_or_default(),
            error: message,
            will_retry,
            timestamp: Utc::now(),
        });
        Ok(will_retry)
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<Job>> {
        jobs::get_job(&self.db, job_id).await
    }

    pub async fn children(&self, parent_id: &str) -> Result<Vec<Job>> {
        jobs::list_children(&self.db, parent_id).await
    }

    /// Requeue jobs left `running` by a previous process, failing those
    /// that were already on their last attempt
    pub async fn recover_stale(&self) -> Result<RecoveredJobs> {
        let recovered = retry_on_lock("recover jobs", self.lock_wait_ms, || {
            jobs::recover_running(&self.db)
        })
        .await?;
        if recovered.failed > 0 {
            warn!(failed = recovered.failed, "Failed jobs interrupted on their last attempt");
        }
        if recovered.requeued > 0 {
            info!(requeued = recovered.requeued, "Requeued interrupted jobs");
            self.notify.notify_waiters();
        }
        Ok(recovered)
    }

    /// Resolves when a job is enqueued
    pub async fn wait_for_work(&self) {
        self.notify.notified().await;
    }
}
