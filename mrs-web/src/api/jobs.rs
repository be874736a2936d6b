//! Background job status

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use mrs_common::db::jobs::{Job, JobStatus};
use mrs_common::db::projects;
use mrs_common::ids::parse_id;
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::AppState;

const JOB_NOT_FOUND: &str = "Job not found";

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub kind: String,
    pub status: JobStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    pub output: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Job> for JobSummary {
    fn from(job: Job) -> Self {
        let output = job.output_json();
        Self {
            id: job.id,
            kind: job.kind,
            status: job.status,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            last_error: job.last_error,
            output,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: JobSummary,
    pub children: Vec<JobSummary>,
}

/// GET /api/jobs/:id
///
/// Visible to members of the job's project.
pub async fn job_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Success<JobDetail>>> {
    let job = match parse_id(&job_id) {
        Some(id) => state.jobs.get(&id).await?,
        None => None,
    }
    .ok_or_else(|| ApiError::NotFound(JOB_NOT_FOUND.to_string()))?;

    let Some(project_id) = job.project_id.as_deref() else {
        return Err(ApiError::forbidden());
    };
    if projects::get_membership(&state.db, project_id, &auth.user.id)
        .await?
        .is_none()
    {
        return Err(ApiError::forbidden());
    }

    let children = state
        .jobs
        .children(&job.id)
        .await?
        .into_iter()
        .map(JobSummary::from)
        .collect();

    Ok(ok(JobDetail {
        job: job.into(),
        children,
    }))
}

pub fn job_routes() -> Router<AppState> {
    Router::new().route("/api/jobs/:id", get(job_status))
}
