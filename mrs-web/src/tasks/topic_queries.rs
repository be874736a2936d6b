//! `generate-queries-for-topic`: supplemental queries for one topic
//!
//! The model sees the existing queries and is told not to repeat them; the
//! insert additionally drops case/whitespace-insensitive duplicates.

use chrono::Utc;
use mrs_ai::prompts;
use mrs_ai::schemas::{parse_structured, GeneratedQueries};
use mrs_common::db::models::NewQuery;
use mrs_common::db::{projects, queries, topics};
use mrs_common::events::MrsEvent;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{company_context, TaskError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TopicPayload {
    pub topic_id: String,
}

pub async fn run(state: &AppState, payload: TopicPayload) -> Result<Value, TaskError> {
    let detail = topics::get_topic_with_queries(&state.db, &payload.topic_id)
        .await?
        .ok_or_else(|| TaskError::NotFound("Topic not found".to_string()))?;
    let topic = detail.topic;

    let project = projects::get_project(&state.db, &topic.project_id)
        .await?
        .ok_or_else(|| TaskError::NotFound("Organization not found".to_string()))?;

    let existing: Vec<String> = detail.queries.into_iter().map(|q| q.text).collect();
    let request = prompts::topic_queries_request(
        &company_context(&project),
        &topic.name,
        topic.description.as_deref().unwrap_or_default(),
        &existing,
    );

    let raw = state.providers.openai.complete(&request).await?;
    let generated: GeneratedQueries = parse_structured(&raw)?;
    let candidates: Vec<NewQuery> = generated.queries.into_iter().map(NewQuery::from).collect();
    let proposed = candidates.len();

    let mut tx = state.db.begin().await?;
    let inserted = queries::insert_unique_queries(
        &mut tx,
        &topic.id,
        &project.id,
        project.region.as_deref(),
        candidates,
    )
    .await?;
    tx.commit().await?;

    info!(
        project_id = %project.id,
        topic_id = %topic.id,
        proposed,
        inserted = inserted.len(),
        "Generated topic queries"
    );

    state.event_bus.emit_lossy(MrsEvent::QueriesGenerated {
        project_id: project.id.clone(),
        topic_id: topic.id.clone(),
        count: inserted.len(),
        timestamp: Utc::now(),
    });
    state
        .event_bus
        .emit_lossy(MrsEvent::project_changed(&project.id, &project.slug, "queries generated"));

    let texts: Vec<&str> = inserted.iter().map(|q| q.text.as_str()).collect();
    Ok(json!({
        "topicId": topic.id,
        "topicName": topic.name,
        "queriesGenerated": inserted.len(),
        "queries": texts,
    }))
}
