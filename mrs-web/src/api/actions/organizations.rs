//! Organization onboarding
//!
//! The wizard submits the company profile together with the topics and
//! queries the user accepted; the plain project form submits only the
//! profile and lets a background job propose topics.

use axum::{extract::State, Json};
use mrs_ai::schemas::AiGeneratedQuery;
use mrs_common::db::models::{NewQuery, NewTopic, Project};
use mrs_common::db::projects::{self, NewProject};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{notify_changed, RunRef};
use crate::auth::MaybeAuthUser;
use crate::error::{ok, ApiError, ApiResult, Success};
use crate::extract::ActionForm;
use crate::tasks::JobKind;
use crate::validation::{website_url, FieldErrors};
use crate::AppState;

const SLUG_TAKEN: &str = "An organization with this slug already exists";

/// Company profile fields; `topics` is only sent by the wizard
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyForm {
    pub name: Option<String>,
    pub website_url: Option<String>,
    pub sector: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    /// JSON array of `{name, description, queries}`
    pub topics: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WizardTopic {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    queries: Vec<AiGeneratedQuery>,
}

#[derive(Debug, Serialize)]
pub struct CreatedProject {
    pub id: String,
    pub slug: String,
    pub run: RunRef,
}

fn validate_company(form: &CompanyForm, errors: &mut FieldErrors) -> NewProject {
    NewProject {
        name: errors.require("name", form.name.as_deref(), "Name is required"),
        url: website_url(
            errors,
            "websiteUrl",
            form.website_url.as_deref(),
            "Valid website URL is required",
        ),
        sector: errors.require("sector", form.sector.as_deref(), "Sector is required"),
        region: errors.require("country", form.country.as_deref(), "Country is required"),
        language: errors.require("language", form.language.as_deref(), "Language is required"),
        description: errors.require(
            "description",
            form.description.as_deref(),
            "Description is required",
        ),
    }
}

/// Parse and validate the wizard's topics field
fn parse_topics(raw: Option<&str>, errors: &mut FieldErrors) -> Vec<NewTopic> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Vec::new();
    }

    let parsed: Vec<WizardTopic> = match serde_json::from_str(raw) {
        Ok(topics) => topics,
        Err(_) => {
            errors.add("topics", "Invalid topics data");
            return Vec::new();
        }
    };

    parsed
        .into_iter()
        .enumerate()
        .map(|(i, topic)| {
            let name = topic.name.trim().to_string();
            if name.is_empty() {
                errors.add(format!("topics.{i}.name"), "Topic name is required");
            }
            let description = topic.description.trim().to_string();
            if description.is_empty() {
                errors.add(format!("topics.{i}.description"), "Topic description is required");
            }

            let queries = topic
                .queries
                .into_iter()
                .enumerate()
                .filter_map(|(j, q)| {
                    if q.text.trim().is_empty() {
                        errors.add(format!("topics.{i}.queries.{j}.text"), "Query text is required");
                        return None;
                    }
                    Some(NewQuery::from(q))
                })
                .collect();

            NewTopic {
                name,
                description: Some(description),
                queries,
            }
        })
        .collect()
}

async fn insert_project(
    state: &AppState,
    new_project: &NewProject,
    user_id: &str,
    topics: &[NewTopic],
) -> ApiResult<Project> {
    match projects::create_project(&state.db, new_project, user_id, topics).await {
        Ok(project) => Ok(project),
        Err(e) if e.is_unique_violation() || matches!(e, mrs_common::Error::Conflict(_)) => {
            Err(ApiError::Conflict(SLUG_TAKEN.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn start_job(state: &AppState, project: &Project, kind: JobKind) -> ApiResult<CreatedProject> {
    let job = state
        .jobs
        .enqueue(kind, json!({ "project_id": project.id }), &project.id, None)
        .await?;

    Ok(CreatedProject {
        id: project.id.clone(),
        slug: project.slug.clone(),
        run: RunRef { id: job.id },
    })
}

/// POST /actions/organizations
pub async fn create_organization(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<CompanyForm>,
) -> ApiResult<Json<Success<CreatedProject>>> {
    let mut errors = FieldErrors::new();
    let new_project = validate_company(&form, &mut errors);
    let topics = parse_topics(form.topics.as_deref(), &mut errors);
    errors.into_result()?;

    let auth = auth.require("You must be authenticated to create an organization")?;
    let project = insert_project(&state, &new_project, &auth.user.id, &topics).await?;
    info!(project_id = %project.id, slug = %project.slug, "Organization created");

    let created = start_job(&state, &project, JobKind::GenerateInitialQueries).await?;
    notify_changed(&state, &project, "organization created");
    Ok(ok(created))
}

/// POST /actions/projects
pub async fn create_project(
    State(state): State<AppState>,
    auth: MaybeAuthUser,
    ActionForm(form): ActionForm<CompanyForm>,
) -> ApiResult<Json<Success<CreatedProject>>> {
    let mut errors = FieldErrors::new();
    let new_project = validate_company(&form, &mut errors);
    errors.into_result()?;

    let auth = auth.require("You must be authenticated to create a project")?;
    let project = insert_project(&state, &new_project, &auth.user.id, &[]).await?;
    info!(project_id = %project.id, slug = %project.slug, "Project created");

    let created = start_job(&state, &project, JobKind::CreateTopicsAndQueries).await?;
    notify_changed(&state, &project, "project created");
    Ok(ok(created))
}
