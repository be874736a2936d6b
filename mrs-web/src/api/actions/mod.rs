//! Form actions
//!
//! Each action takes an `application/x-www-form-urlencoded` body, validates
//! it, checks the caller's session and membership, writes through the
//! repositories and answers with the success/failure envelope. Successful
//! mutations publish `ProjectChanged` so open views reload.

pub mod organizations;
pub mod projects;
pub mod queries;
pub mod topics;

use axum::{routing::post, Router};
use mrs_common::db::models::Project;
use mrs_common::events::MrsEvent;
use serde::Serialize;

use crate::AppState;

/// Reference to an enqueued background job
#[derive(Debug, Serialize)]
pub struct RunRef {
    pub id: String,
}

/// `{id}` answer for deletes
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: String,
}

pub(crate) fn notify_changed(state: &AppState, project: &Project, reason: &str) {
    state
        .event_bus
        .emit_lossy(MrsEvent::project_changed(&project.id, &project.slug, reason));
}

/// Organization id from either form field name
pub(crate) fn project_id_field<'a>(organization_id: &'a Option<String>, project_id: &'a Option<String>) -> Option<&'a str> {
    [organization_id, project_id]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::trim)
        .find(|id| !id.is_empty())
}

pub fn action_routes() -> Router<AppState> {
    Router::new()
        .route("/actions/organizations", post(organizations::create_organization))
        .route("/actions/projects", post(organizations::create_project))
        .route("/actions/projects/update", post(projects::update_project))
        .route("/actions/projects/delete", post(projects::delete_project))
        .route("/actions/topics", post(topics::create_topic))
        .route("/actions/topics/update", post(topics::update_topic))
        .route("/actions/topics/delete", post(topics::delete_topic))
        .route("/actions/topics/generate", post(topics::generate_topic_queries))
        .route("/actions/queries", post(queries::create_query))
        .route("/actions/queries/update", post(queries::update_query))
        .route("/actions/queries/delete", post(queries::delete_query))
}
