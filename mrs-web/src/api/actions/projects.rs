//! Project settings and deletion

use axum::{extract::State, Json};
use mrs_common::db::models::{MembershipRole, Project};
use mrs_common::db::projects::{self, ProjectUpdate};
use serde::Deserialize;
use tracing::info;

use super::{notify_changed, project_id_field, Deleted};
use crate::api::access::member_project;
use crate::auth::MaybeAuthUser;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::extract::ActionForm;
use crate::validation::{is_valid_website_url, normalize_website_url, FieldErrors};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectForm {
    pub project_id: Option<String>,
    pub organization_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub sector: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProjectForm {
    pub project_id: Option<String>,
    pub organization_id: Option<String>,
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// POST /actions/projects/update
pub async fn update_project(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<UpdateProjectForm>,
) -> ApiResult<Json<Success<Project>>> {
    let mut errors = FieldErrors::new();
    let project_id = project_id_field(&form.organization_id, &form.project_id);
    if project_id.is_none() {
        errors.add("projectId", "Organization id is required");
    }
    let name = errors.require("name", form.name.as_deref(), "Name is required");

    let url = optional(&form.website_url).map(|raw| normalize_website_url(&raw));
    if let Some(url) = &url {
        if !is_valid_website_url(url) {
            errors.add("websiteUrl", "Valid website URL is required");
        }
    }
    errors.into_result()?;

    let auth = auth.require("Unauthorized")?;
    let (project, _) = member_project(&state, &auth.user.id, project_id.unwrap_or_default()).await?;

    let update = ProjectUpdate {
        name: Some(name),
        description: optional(&form.description),
        url,
        sector: optional(&form.sector),
        region: optional(&form.country),
        language: optional(&form.language),
    };
    let updated = projects::update_project(&state.db, &project.id, &update).await?;

    info!(project_id = %updated.id, "Project updated");
    notify_changed(&state, &updated, "project updated");
    Ok(ok(updated))
}

/// POST /actions/projects/delete
///
/// Admins only. Topics, queries and research results cascade.
pub async fn delete_project(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<DeleteProjectForm>,
) -> ApiResult<Json<Success<Deleted>>> {
    let Some(project_id) = project_id_field(&form.organization_id, &form.project_id) else {
        return Err(ApiError::BadRequest("projectId: Organization id is required".to_string()));
    };

    let auth = auth.require("Unauthorized")?;
    let (project, membership) = member_project(&state, &auth.user.id, project_id).await?;
    if membership.role != MembershipRole::Admin {
        return Err(ApiError::forbidden());
    }

    projects::delete_project(&state.db, &project.id).await?;

    info!(project_id = %project.id, "Project deleted");
    notify_changed(&state, &project, "project deleted");
    Ok(ok(Deleted { id: project.id }))
}
