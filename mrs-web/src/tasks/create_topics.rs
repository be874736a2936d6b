//! `create-topics-and-queries`: build a project's first topics server-side

use mrs_ai::prompts;
use mrs_ai::schemas::{parse_structured, GeneratedTopics};
use mrs_common::db::jobs::Job;
use mrs_common::db::models::NewQuery;
use mrs_common::db::{projects, queries, topics};
use mrs_common::events::MrsEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{company_context, JobKind, TaskError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProjectPayload {
    pub project_id: String,
}

pub async fn run(state: &AppState, job: &Job, payload: ProjectPayload) -> Result<Value, TaskError> {
    let project = projects::get_project(&state.db, &payload.project_id)
        .await?
        .ok_or_else(|| TaskError::NotFound("Organization not found".to_string()))?;

    let request = prompts::topics_and_queries_request(&company_context(&project));
    let raw = state.providers.openai.complete(&request).await?;
    let generated: GeneratedTopics = parse_structured(&raw)?;

    let mut tx = state.db.begin().await?;
    let mut topics_created = 0usize;
    let mut queries_created = 0usize;
    for suggestion in generated.topics {
        let name = suggestion.name.trim().to_string();
        if name.is_empty() {
            continue;
        }
        let description = Some(suggestion.description.trim()).filter(|d| !d.is_empty());
        let topic = topics::insert_topic(&mut *tx, &project.id, &name, description).await?;
        topics_created += 1;

        let candidates: Vec<NewQuery> = suggestion.queries.into_iter().map(NewQuery::from).collect();
        let inserted = queries::insert_unique_queries(
            &mut tx,
            &topic.id,
            &project.id,
            project.region.as_deref(),
            candidates,
        )
        .await?;
        queries_created += inserted.len();
    }
    tx.commit().await?;

    info!(
        project_id = %project.id,
        topics = topics_created,
        queries = queries_created,
        "Generated initial topics"
    );
    state
        .event_bus
        .emit_lossy(MrsEvent::project_changed(&project.id, &project.slug, "topics generated"));

    let next = state
        .jobs
        .enqueue(
            JobKind::GenerateInitialQueries,
            json!({ "project_id": project.id }),
            &project.id,
            Some(&job.id),
        )
        .await?;

    Ok(json!({
        "topicsCreated": topics_created,
        "queriesCreated": queries_created,
        "next": next.id,
    }))
}
