//! Query actions

use axum::{extract::State, Json};
use mrs_common::db::models::QueryType;
use mrs_common::db::{queries, topics};
use mrs_common::ids::parse_id;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{notify_changed, project_id_field, Deleted};
use crate::api::access::{member_project, member_query, TOPIC_NOT_FOUND};
use crate::auth::MaybeAuthUser;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::extract::ActionForm;
use crate::validation::{parse_flag, FieldErrors};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueryForm {
    pub topic_id: Option<String>,
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
    pub content: Option<String>,
    pub query_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQueryForm {
    pub query_id: Option<String>,
    pub content: Option<String>,
    pub active: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryIdForm {
    pub query_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRef {
    pub id: String,
    pub content: String,
    pub query_type: QueryType,
    pub active: bool,
}

/// POST /actions/queries
///
/// `queryType` defaults to `sector`; the topic must belong to the project.
pub async fn create_query(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<CreateQueryForm>,
) -> ApiResult<Json<Success<QueryRef>>> {
    let mut errors = FieldErrors::new();
    let topic_id = errors.require("topicId", form.topic_id.as_deref(), "Topic id is required");
    let project_id = project_id_field(&form.organization_id, &form.project_id);
    if project_id.is_none() {
        errors.add("organizationId", "Organization id is required");
    }
    let content = errors.require("content", form.content.as_deref(), "Query content is required");

    let query_type = match form.query_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        None => QueryType::Sector,
        Some(raw) => QueryType::parse(raw).unwrap_or_else(|| {
            errors.add("queryType", "Invalid query type");
            QueryType::Sector
        }),
    };
    errors.into_result()?;

    let auth = auth.require("Unauthorized")?;
    let (project, _) = member_project(&state, &auth.user.id, project_id.unwrap_or_default()).await?;

    let topic = match parse_id(&topic_id) {
        Some(id) => topics::get_topic(&state.db, &id).await?,
        None => None,
    }
    .filter(|t| t.project_id == project.id)
    .ok_or_else(|| ApiError::NotFound(TOPIC_NOT_FOUND.to_string()))?;

    let query = queries::insert_query(
        &state.db,
        &topic.id,
        &project.id,
        &content,
        query_type,
        project.region.as_deref(),
    )
    .await?;

    info!(project_id = %project.id, query_id = %query.id, "Query created");
    notify_changed(&state, &project, "query created");
    Ok(ok(QueryRef {
        id: query.id,
        content: query.text,
        query_type: query.query_type,
        active: query.active,
    }))
}

/// POST /actions/queries/update
pub async fn update_query(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<UpdateQueryForm>,
) -> ApiResult<Json<Success<QueryRef>>> {
    let mut errors = FieldErrors::new();
    let query_id = errors.require("queryId", form.query_id.as_deref(), "Query id is required");
    let content = errors.require("content", form.content.as_deref(), "Query content is required");

    let active = match form.active.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        None => None,
        Some(raw) => {
            let flag = parse_flag(raw);
            if flag.is_none() {
                errors.add("active", "Invalid value");
            }
            flag
        }
    };
    errors.into_result()?;

    let auth = auth.require("Unauthorized")?;
    let (query, project) = member_query(&state, &auth.user.id, &query_id).await?;

    let updated = queries::update_query(&state.db, &query.id, &content, active).await?;

    info!(query_id = %updated.id, "Query updated");
    notify_changed(&state, &project, "query updated");
    Ok(ok(QueryRef {
        id: updated.id,
        content: updated.text,
        query_type: updated.query_type,
        active: updated.active,
    }))
}

/// POST /actions/queries/delete
pub async fn delete_query(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<QueryIdForm>,
) -> ApiResult<Json<Success<Deleted>>> {
    let mut errors = FieldErrors::new();
    let query_id = errors.require("queryId", form.query_id.as_deref(), "Query id is required");
    errors.into_result()?;

    let auth = auth.require("Unauthorized")?;
    let (query, project) = member_query(&state, &auth.user.id, &query_id).await?;

    queries::delete_query(&state.db, &query.id).await?;

    info!(query_id = %query.id, "Query deleted");
    notify_changed(&state, &project, "query deleted");
    Ok(ok(Deleted { id: query.id }))
}
