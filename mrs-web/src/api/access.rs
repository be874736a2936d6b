//! Membership checks shared by actions and read views
//!
//! Lookup order is always: parse the id (malformed ids are treated as
//! unknown), load the entity (404), then require a membership row for the
//! owning project (403).

use mrs_common::db::models::{Membership, Project, Query, Topic};
use mrs_common::db::{projects, queries, topics};
use mrs_common::ids::parse_id;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const ORGANIZATION_NOT_FOUND: &str = "Organization not found";
pub const TOPIC_NOT_FOUND: &str = "Topic not found";
pub const QUERY_NOT_FOUND: &str = "Query not found";

async fn require_membership(state: &AppState, project: &Project, user_id: &str) -> ApiResult<Membership> {
    projects::get_membership(&state.db, &project.id, user_id)
        .await?
        .ok_or_else(ApiError::forbidden)
}

/// Project by id, for a member
pub async fn member_project(
    state: &AppState,
    user_id: &str,
    project_id: &str,
) -> ApiResult<(Project, Membership)> {
    let project = match parse_id(project_id) {
        Some(id) => projects::get_project(&state.db, &id).await?,
        None => None,
    }
    .ok_or_else(|| ApiError::NotFound(ORGANIZATION_NOT_FOUND.to_string()))?;

    let membership = require_membership(state, &project, user_id).await?;
    Ok((project, membership))
}

/// Project by slug, for a member
pub async fn member_project_by_slug(
    state: &AppState,
    user_id: &str,
    slug: &str,
) -> ApiResult<(Project, Membership)> {
    let project = projects::get_project_by_slug(&state.db, slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(ORGANIZATION_NOT_FOUND.to_string()))?;

    let membership = require_membership(state, &project, user_id).await?;
    Ok((project, membership))
}

/// Topic by id with its project, for a member of that project
pub async fn member_topic(state: &AppState, user_id: &str, topic_id: &str) -> ApiResult<(Topic, Project)> {
    let topic = match parse_id(topic_id) {
        Some(id) => topics::get_topic(&state.db, &id).await?,
        None => None,
    }
    .ok_or_else(|| ApiError::NotFound(TOPIC_NOT_FOUND.to_string()))?;

    let (project, _) = member_project(state, user_id, &topic.project_id).await?;
    Ok((topic, project))
}

/// Query by id with its project, for a member of that project
pub async fn member_query(state: &AppState, user_id: &str, query_id: &str) -> ApiResult<(Query, Project)> {
    let query = match parse_id(query_id) {
        Some(id) => queries::get_query(&state.db, &id).await?,
        None => None,
    }
    .ok_or_else(|| ApiError::NotFound(QUERY_NOT_FOUND.to_string()))?;

    let (project, _) = member_project(state, user_id, &query.project_id).await?;
    Ok((query, project))
}
