//! Topic actions

use axum::{extract::State, Json};
use mrs_common::db::topics;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{notify_changed, project_id_field, Deleted, RunRef};
use crate::api::access::{member_project, member_topic};
use crate::auth::MaybeAuthUser;
use crate::error::{ok, ApiResult, Success};
use crate::extract::ActionForm;
use crate::tasks::JobKind;
use crate::validation::FieldErrors;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicForm {
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTopicForm {
    pub topic_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicIdForm {
    pub topic_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TopicRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationStarted {
    pub run: RunRef,
}

fn require_topic_id(errors: &mut FieldErrors, topic_id: &Option<String>) -> String {
    errors.require("topicId", topic_id.as_deref(), "Topic id is required")
}

/// POST /actions/topics
pub async fn create_topic(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<CreateTopicForm>,
) -> ApiResult<Json<Success<TopicRef>>> {
    let mut errors = FieldErrors::new();
    let project_id = project_id_field(&form.organization_id, &form.project_id);
    if project_id.is_none() {
        errors.add("organizationId", "Organization id is required");
    }
    let name = errors.require("name", form.name.as_deref(), "Topic name is required");
    let description = errors.require(
        "description",
        form.description.as_deref(),
        "Description is required",
    );
    errors.into_result()?;

    let auth = auth.require("Unauthorized")?;
    let (project, _) = member_project(&state, &auth.user.id, project_id.unwrap_or_default()).await?;

    let topic = topics::insert_topic(&state.db, &project.id, &name, Some(&description)).await?;

    info!(project_id = %project.id, topic_id = %topic.id, "Topic created");
    notify_changed(&state, &project, "topic created");
    Ok(ok(TopicRef {
        id: topic.id,
        name: topic.name,
    }))
}

/// POST /actions/topics/update
pub async fn update_topic(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<UpdateTopicForm>,
) -> ApiResult<Json<Success<TopicRef>>> {
    let mut errors = FieldErrors::new();
    let topic_id = require_topic_id(&mut errors, &form.topic_id);
    let name = errors.require("name", form.name.as_deref(), "Topic name is required");
    errors.into_result()?;

    let auth = auth.require("Unauthorized")?;
    let (topic, project) = member_topic(&state, &auth.user.id, &topic_id).await?;

    let description = form
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let updated = topics::update_topic(&state.db, &topic.id, &name, description).await?;

    info!(topic_id = %updated.id, "Topic updated");
    notify_changed(&state, &project, "topic updated");
    Ok(ok(TopicRef {
        id: updated.id,
        name: updated.name,
    }))
}

/// POST /actions/topics/delete
pub async fn delete_topic(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<TopicIdForm>,
) -> ApiResult<Json<Success<Deleted>>> {
    let mut errors = FieldErrors::new();
    let topic_id = require_topic_id(&mut errors, &form.topic_id);
    errors.into_result()?;

    let auth = auth.require("Unauthorized")?;
    let (topic, project) = member_topic(&state, &auth.user.id, &topic_id).await?;

    topics::delete_topic(&state.db, &topic.id).await?;

    info!(topic_id = %topic.id, "Topic deleted");
    notify_changed(&state, &project, "topic deleted");
    Ok(ok(Deleted { id: topic.id }))
}

/// POST /actions/topics/generate
///
/// Queue supplemental query generation for one topic.
pub async fn generate_topic_queries(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<TopicIdForm>,
) -> ApiResult<Json<Success<GenerationStarted>>> {
    let mut errors = FieldErrors::new();
    let topic_id = require_topic_id(&mut errors, &form.topic_id);
    errors.into_result()?;

    let auth = auth.require("Unauthorized")?;
    let (topic, project) = member_topic(&state, &auth.user.id, &topic_id).await?;

    let job = state
        .jobs
        .enqueue(
            JobKind::GenerateQueriesForTopic,
            json!({ "topic_id": topic.id }),
            &project.id,
            None,
        )
        .await?;

    Ok(ok(GenerationStarted {
        run: RunRef { id: job.id },
    }))
}
