//! Worker pool
//!
//! Each worker loops: claim a job, run it, record the outcome. When the queue
//! is empty it sleeps until a wake-up or the poll interval, whichever comes
//! first. Cancellation is checked between jobs; a job in flight finishes.

use mrs_common::db::jobs::Job;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument};

use super::run_job;
use crate::AppState;

pub struct WorkerPool {
    state: AppState,
    count: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(state: AppState, count: usize, poll_interval: Duration) -> Self {
        Self {
            state,
            count: count.max(1),
            poll_interval,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(workers = self.count, "Starting job workers");
        (0..self.count)
            .map(|worker_id| {
                let state = self.state.clone();
                let cancel = cancel.clone();
                let poll_interval = self.poll_interval;
                tokio::spawn(async move {
                    worker_loop(worker_id, state, poll_interval, cancel).await;
                })
            })
            .collect()
    }
}

async fn worker_loop(worker_id: usize, state: AppState, poll_interval: Duration, cancel: CancellationToken) {
    debug!(worker_id, "Worker started");

    while !cancel.is_cancelled() {
        match state.jobs.claim_next().await {
            Ok(Some(job)) => execute(&state, job).await,
            Ok(None) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = state.jobs.wait_for_work() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            Err(e) => {
                error!(worker_id, "Failed to claim job: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
    }

    debug!(worker_id, "Worker stopped");
}

/// Run a claimed job and record completion or failure
pub async fn execute(state: &AppState, job: Job) {
    let span = tracing::info_span!(
        "job",
        job_id = %job.id,
        kind = %job.kind,
        attempt = job.attempts
    );

    async {
        info!("Job started");
        match run_job(state, &job).await {
            Ok(output) => {
                if let Err(e) = state.jobs.complete(&job, &output).await {
                    error!("Failed to record job completion: {}", e);
                } else {
                    info!("Job completed");
                }
            }
            Err(task_error) => {
                if let Err(e) = state.jobs.fail(&job, &task_error).await {
                    error!("Failed to record job failure ({}): {}", task_error, e);
                }
            }
        }
    }
    .instrument(span)
    .await
}

/// Run ready jobs on the current task until the queue is empty
///
/// Returns the number of jobs executed. Jobs rescheduled with a backoff are
/// not ready and therefore not waited for.
pub async fn run_until_idle(state: &AppState) -> mrs_common::Result<usize> {
    let mut executed = 0;
    while let Some(job) = state.jobs.claim_next().await? {
        execute(state, job).await;
        executed += 1;
    }
    Ok(executed)
}
