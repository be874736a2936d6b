//! Results dashboard and analysis trigger

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mrs_common::db::projects;
use mrs_common::db::results::{self, ResultsDashboard, ResultsFilter};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::access::member_project_by_slug;
use crate::auth::AuthUser;
use crate::error::{ok, ApiResult, Success};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub models: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisStarted {
    pub project_id: String,
    pub models: Vec<String>,
}

/// GET /api/projects/:slug/results
pub async fn project_results(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
    Query(filter): Query<ResultsFilter>,
) -> ApiResult<Json<Success<ResultsDashboard>>> {
    let (project, _) = member_project_by_slug(&state, &auth.user.id, &slug).await?;
    let dashboard = results::load_results(&state.db, &project.id, &filter).await?;
    Ok(ok(dashboard))
}

/// POST /api/projects/:slug/analysis
///
/// Without an explicit model list the project's configured models are used.
pub async fn trigger_analysis(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
    body: Option<Json<AnalysisRequest>>,
) -> ApiResult<(StatusCode, Json<Success<AnalysisStarted>>)> {
    let (project, _) = member_project_by_slug(&state, &auth.user.id, &slug).await?;

    let requested = body
        .and_then(|Json(req)| req.models)
        .map(|models| {
            models
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|models| !models.is_empty());

    let models = match requested {
        Some(models) => models,
        None => projects::analysis_models(&state.db, &project.id).await?,
    };

    state.webhook.trigger(&project.id, &models).await?;

    info!(project_id = %project.id, models = models.len(), "Analysis requested");
    Ok((
        StatusCode::ACCEPTED,
        ok(AnalysisStarted {
            project_id: project.id,
            models,
        }),
    ))
}

pub fn results_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:slug/results", get(project_results))
        .route("/api/projects/:slug/analysis", post(trigger_analysis))
}
