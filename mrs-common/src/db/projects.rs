//! Projects (tenant roots) and memberships

use crate::db::models::{
    Membership, MembershipRole, NewTopic, Project, ProjectOverview, ProjectWithRole,
};
use crate::db::retry::retry_on_lock;
use crate::db::{queries, topics};
use crate::ids::new_id;
use crate::slug::{slugify, with_suffix};
use crate::{Error, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, info};

/// Attempts at finding a free suffixed slug before giving up
const SLUG_SUFFIX_ATTEMPTS: usize = 5;

/// How long onboarding waits out a competing writer
const CREATE_LOCK_WAIT_MS: u64 = 5000;

/// Fields captured by the onboarding wizard
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub url: String,
    pub sector: String,
    pub region: String,
    pub language: String,
    pub description: String,
}

/// Partial update; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub sector: Option<String>,
    pub region: Option<String>,
    pub language: Option<String>,
}

pub async fn slug_exists<'e, E: SqliteExecutor<'e>>(db: E, slug: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE slug = ?)")
        .bind(slug)
        .fetch_one(db)
        .await?;
    Ok(exists)
}

/// Pick a free slug for `name`: the plain slug, else the slug plus a random
/// 4-character suffix
pub async fn resolve_unique_slug(conn: &mut SqliteConnection, name: &str) -> Result<String> {
    let base = slugify(name);
    if !slug_exists(&mut *conn, &base).await? {
        return Ok(base);
    }

    for _ in 0..SLUG_SUFFIX_ATTEMPTS {
        let candidate = with_suffix(&base);
        if !slug_exists(&mut *conn, &candidate).await? {
            debug!(base = %base, slug = %candidate, "Slug taken, using suffixed slug");
            return Ok(candidate);
        }
    }

    Err(Error::Conflict(format!("slug '{}' is already in use", base)))
}

/// Create a project, its admin membership and any initial topics/queries
///
/// Everything happens in one transaction: either the project exists with its
/// creator as admin and all supplied topics, or nothing was written.
/// Queries inherit the project region as their country.
///
/// The slug is read and then written inside a deferred transaction; two
/// concurrent creations can fail the lock upgrade with `SQLITE_BUSY`. The
/// whole transaction is then retried, slug lookup included.
pub async fn create_project(
    pool: &SqlitePool,
    new_project: &NewProject,
    user_id: &str,
    initial_topics: &[NewTopic],
) -> Result<Project> {
    retry_on_lock("create project", CREATE_LOCK_WAIT_MS, || {
        insert_project(pool, new_project, user_id, initial_topics)
    })
    .await
}

async fn insert_project(
    pool: &SqlitePool,
    new_project: &NewProject,
    user_id: &str,
    initial_topics: &[NewTopic],
) -> Result<Project> {
    let mut tx = pool.begin().await?;

    let slug = resolve_unique_slug(&mut tx, &new_project.name).await?;
    let now = Utc::now();
    let project = Project {
        id: new_id(),
        name: new_project.name.clone(),
        slug,
        description: Some(new_project.description.clone()),
        url: Some(new_project.url.clone()),
        status: 1,
        region: Some(new_project.region.clone()),
        sector: Some(new_project.sector.clone()),
        language: Some(new_project.language.clone()),
        last_analysis: None,
        logo: None,
        user_id: user_id.to_string(),
        created_at: now,
        updated_at: now,
    };

    let inserted = sqlx::query(
        r#"
        INSERT INTO projects (id, name, slug, description, url, status, region, sector, language,
                              user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.id)
    .bind(&project.name)
    .bind(&project.slug)
    .bind(&project.description)
    .bind(&project.url)
    .bind(project.status)
    .bind(&project.region)
    .bind(&project.sector)
    .bind(&project.language)
    .bind(&project.user_id)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(Error::from);

    if let Err(e) = inserted {
        if e.is_unique_violation() {
            return Err(Error::Conflict(format!(
                "slug '{}' is already in use",
                project.slug
            )));
        }
        return Err(e);
    }

    insert_membership(&mut *tx, &project.id, user_id, MembershipRole::Admin).await?;

    let mut query_count = 0usize;
    for new_topic in initial_topics {
        let topic = topics::insert_topic(
            &mut *tx,
            &project.id,
            &new_topic.name,
            new_topic.description.as_deref(),
        )
        .await?;
        for q in &new_topic.queries {
            queries::insert_query(
                &mut *tx,
                &topic.id,
                &project.id,
                &q.text,
                q.query_type,
                project.region.as_deref(),
            )
            .await?;
            query_count += 1;
        }
    }

    tx.commit().await?;

    info!(
        project_id = %project.id,
        slug = %project.slug,
        topics = initial_topics.len(),
        queries = query_count,
        "Created project"
    );
    Ok(project)
}

pub async fn insert_membership<'e, E: SqliteExecutor<'e>>(
    db: E,
    project_id: &str,
    user_id: &str,
    role: MembershipRole,
) -> Result<Membership> {
    let membership = Membership {
        id: new_id(),
        project_id: project_id.to_string(),
        user_id: user_id.to_string(),
        role,
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO projects_users (id, project_id, user_id, role, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&membership.id)
    .bind(&membership.project_id)
    .bind(&membership.user_id)
    .bind(membership.role)
    .bind(membership.created_at)
    .execute(db)
    .await?;

    Ok(membership)
}

pub async fn get_membership(
    pool: &SqlitePool,
    project_id: &str,
    user_id: &str,
) -> Result<Option<Membership>> {
    let membership = sqlx::query_as::<_, Membership>(
        "SELECT * FROM projects_users WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(membership)
}

pub async fn get_project(pool: &SqlitePool, project_id: &str) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(pool)
        .await?;
    Ok(project)
}

pub async fn get_project_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?;
    Ok(project)
}

/// Projects the user belongs to, newest first
pub async fn list_projects_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<ProjectWithRole>> {
    let projects = sqlx::query_as::<_, ProjectWithRole>(
        r#"
        SELECT p.*, pu.role AS role
        FROM projects p
        JOIN projects_users pu ON pu.project_id = p.id
        WHERE pu.user_id = ?
        ORDER BY p.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(projects)
}

/// Ids of every project the user belongs to
pub async fn member_project_ids(pool: &SqlitePool, user_id: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar("SELECT project_id FROM projects_users WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

pub async fn update_project(
    pool: &SqlitePool,
    project_id: &str,
    update: &ProjectUpdate,
) -> Result<Project> {
    let rows = sqlx::query(
        r#"
        UPDATE projects SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            url = COALESCE(?, url),
            sector = COALESCE(?, sector),
            region = COALESCE(?, region),
            language = COALESCE(?, language),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&update.name)
    .bind(&update.description)
    .bind(&update.url)
    .bind(&update.sector)
    .bind(&update.region)
    .bind(&update.language)
    .bind(Utc::now())
    .bind(project_id)
    .execute(pool)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(Error::NotFound("Organization not found".into()));
    }

    get_project(pool, project_id)
        .await?
        .ok_or_else(|| Error::NotFound("Organization not found".into()))
}

/// Delete a project; topics, queries and all research rows cascade
pub async fn delete_project(pool: &SqlitePool, project_id: &str) -> Result<bool> {
    let rows = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

/// Project page aggregate: topics by name, each with queries by text
pub async fn get_project_overview(
    pool: &SqlitePool,
    project: Project,
    role: MembershipRole,
) -> Result<ProjectOverview> {
    let topics = topics::list_topics_with_queries(pool, &project.id).await?;
    Ok(ProjectOverview {
        project,
        role,
        topics,
    })
}

/// Model identifiers configured for a project, falling back to every known model
pub async fn analysis_models(pool: &SqlitePool, project_id: &str) -> Result<Vec<String>> {
    let configured: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT m.model FROM project_models pm
        JOIN models m ON m.id = pm.model_id
        WHERE pm.project_id = ?
        ORDER BY m.name
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    if !configured.is_empty() {
        return Ok(configured);
    }

    let all = sqlx::query_scalar("SELECT model FROM models ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(all)
}
