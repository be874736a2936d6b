//! Background tasks
//!
//! Durable jobs stored in the `jobs` table and executed by a [`WorkerPool`]:
//!
//! ```text
//! create-topics-and-queries ──► generate-initial-queries ──► generate-queries-for-topic (× topics)
//! ```
//!
//! The wizard skips the first step (it submits topics itself) and enqueues
//! `generate-initial-queries` directly. A [`TaskError::NotFound`] ends a job
//! immediately; every other failure is retried with exponential backoff.

pub mod create_topics;
pub mod initial_queries;
pub mod queue;
pub mod topic_queries;
pub mod worker;

pub use queue::JobQueue;
pub use worker::WorkerPool;

use mrs_ai::prompts::CompanyContext;
use mrs_ai::AiError;
use mrs_common::db::jobs::Job;
use mrs_common::db::models::Project;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::AppState;

/// Job kinds understood by the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    CreateTopicsAndQueries,
    GenerateInitialQueries,
    GenerateQueriesForTopic,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::CreateTopicsAndQueries => "create-topics-and-queries",
            JobKind::GenerateInitialQueries => "generate-initial-queries",
            JobKind::GenerateQueriesForTopic => "generate-queries-for-topic",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "create-topics-and-queries" => Some(JobKind::CreateTopicsAndQueries),
            "generate-initial-queries" => Some(JobKind::GenerateInitialQueries),
            "generate-queries-for-topic" => Some(JobKind::GenerateQueriesForTopic),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    /// Target entity is gone; retrying cannot help
    #[error("{0}")]
    NotFound(String),

    /// Payload does not match the job kind
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Database error: {0}")]
    Database(#[from] mrs_common::Error),
}

impl TaskError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TaskError::NotFound(_) | TaskError::InvalidPayload(_))
    }
}

impl From<sqlx::Error> for TaskError {
    fn from(err: sqlx::Error) -> Self {
        TaskError::Database(err.into())
    }
}

/// Decode a job payload into the handler's input type
pub(crate) fn payload<T: DeserializeOwned>(job: &Job) -> Result<T, TaskError> {
    let value = job
        .payload_json()
        .map_err(|e| TaskError::InvalidPayload(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| TaskError::InvalidPayload(e.to_string()))
}

/// Prompt context describing a project's company
pub(crate) fn company_context(project: &Project) -> CompanyContext {
    CompanyContext {
        name: project.name.clone(),
        website: project.url.clone().unwrap_or_default(),
        country: project.region.clone().unwrap_or_default(),
        language: project.language.clone().unwrap_or_default(),
        sector: project.sector.clone().unwrap_or_default(),
        description: project.description.clone().unwrap_or_default(),
    }
}

/// Execute one claimed job, returning its output document
pub async fn run_job(state: &AppState, job: &Job) -> Result<Value, TaskError> {
    let kind = JobKind::parse(&job.kind)
        .ok_or_else(|| TaskError::InvalidPayload(format!("unknown job kind '{}'", job.kind)))?;

    match kind {
        JobKind::CreateTopicsAndQueries => create_topics::run(state, job, payload(job)?).await,
        JobKind::GenerateInitialQueries => initial_queries::run(state, job, payload(job)?).await,
        JobKind::GenerateQueriesForTopic => topic_queries::run(state, payload(job)?).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            JobKind::CreateTopicsAndQueries,
            JobKind::GenerateInitialQueries,
            JobKind::GenerateQueriesForTopic,
        ] {
            assert_eq!(JobKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::parse("send-email"), None);
    }

    #[test]
    fn test_retry_classification() {
        assert!(!TaskError::NotFound("Topic not found".into()).is_retryable());
        assert!(!TaskError::InvalidPayload("missing topic_id".into()).is_retryable());
        assert!(TaskError::Ai(AiError::Stream("overloaded".into())).is_retryable());
        assert!(TaskError::Database(mrs_common::Error::Internal("locked".into())).is_retryable());
    }
}
