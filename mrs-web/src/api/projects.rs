//! Project read views

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use mrs_common::db::models::{ProjectOverview, ProjectWithRole, Query, TopicWithQueries};
use mrs_common::db::{projects, queries, topics};
use mrs_common::ids::parse_id;
use serde::Serialize;

use crate::api::access::{member_project_by_slug, QUERY_NOT_FOUND, TOPIC_NOT_FOUND};
use crate::auth::AuthUser;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct QueryDetail {
    pub topic: TopicWithQueries,
    pub query: Query,
}

/// Topic of the project, treating malformed ids and foreign topics as unknown
async fn project_topic(state: &AppState, project_id: &str, topic_id: &str) -> ApiResult<TopicWithQueries> {
    match parse_id(topic_id) {
        Some(id) => topics::get_topic_with_queries(&state.db, &id).await?,
        None => None,
    }
    .filter(|t| t.topic.project_id == project_id)
    .ok_or_else(|| ApiError::NotFound(TOPIC_NOT_FOUND.to_string()))
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Success<Vec<ProjectWithRole>>>> {
    let projects = projects::list_projects_for_user(&state.db, &auth.user.id).await?;
    Ok(ok(projects))
}

/// GET /api/projects/:slug
pub async fn project_overview(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<Success<ProjectOverview>>> {
    let (project, membership) = member_project_by_slug(&state, &auth.user.id, &slug).await?;
    let overview = projects::get_project_overview(&state.db, project, membership.role).await?;
    Ok(ok(overview))
}

/// GET /api/projects/:slug/topics/:topic_id
pub async fn topic_detail(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((slug, topic_id)): Path<(String, String)>,
) -> ApiResult<Json<Success<TopicWithQueries>>> {
    let (project, _) = member_project_by_slug(&state, &auth.user.id, &slug).await?;
    let topic = project_topic(&state, &project.id, &topic_id).await?;
    Ok(ok(topic))
}

/// GET /api/projects/:slug/topics/:topic_id/queries/:query_id
pub async fn query_detail(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((slug, topic_id, query_id)): Path<(String, String, String)>,
) -> ApiResult<Json<Success<QueryDetail>>> {
    let (project, _) = member_project_by_slug(&state, &auth.user.id, &slug).await?;
    let topic = project_topic(&state, &project.id, &topic_id).await?;

    let query = match parse_id(&query_id) {
        Some(id) => queries::get_query(&state.db, &id).await?,
        None => None,
    }
    .filter(|q| q.topic_id == topic.topic.id)
    .ok_or_else(|| ApiError::NotFound(QUERY_NOT_FOUND.to_string()))?;

    Ok(ok(QueryDetail { topic, query }))
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects))
        .route("/api/projects/:slug", get(project_overview))
        .route("/api/projects/:slug/topics/:topic_id", get(topic_detail))
        .route(
            "/api/projects/:slug/topics/:topic_id/queries/:query_id",
            get(query_detail),
        )
}
