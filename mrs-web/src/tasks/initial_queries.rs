//! `generate-initial-queries`: fan out one query job per topic

use mrs_common::db::jobs::Job;
use mrs_common::db::{projects, topics};
use serde_json::{json, Value};
use tracing::info;

use super::create_topics::ProjectPayload;
use super::{JobKind, TaskError};
use crate::AppState;

pub async fn run(state: &AppState, job: &Job, payload: ProjectPayload) -> Result<Value, TaskError> {
    let project = projects::get_project(&state.db, &payload.project_id)
        .await?
        .ok_or_else(|| TaskError::NotFound("Organization not found".to_string()))?;

    let topic_ids = topics::list_topic_ids(&state.db, &project.id).await?;
    let payloads: Vec<Value> = topic_ids
        .iter()
        .map(|topic_id| json!({ "topic_id": topic_id }))
        .collect();

    let children = state
        .jobs
        .enqueue_batch(JobKind::GenerateQueriesForTopic, payloads, &project.id, &job.id)
        .await?;

    info!(
        project_id = %project.id,
        topics = topic_ids.len(),
        "Queued query generation per topic"
    );

    let batch: Vec<&str> = children.iter().map(|j| j.id.as_str()).collect();
    Ok(json!({
        "batch": batch,
        "additionalQueriesGenerated": children.len(),
    }))
}
