//! Integration tests for the repository layer
//!
//! Tests cover:
//! - Project creation with admin membership and initial topics/queries
//! - Slug collision handling
//! - Cascading deletes from the tenant root
//! - Unique constraints on research result tables
//! - Duplicate-safe query insertion
//! - Job table claim/retry lifecycle
//! - Results dashboard aggregation

use chrono::{Duration, Utc};
use mrs_common::db::init::init_database;
use mrs_common::db::jobs::{self, JobStatus, NewJob};
use mrs_common::db::models::{MembershipRole, NewQuery, NewTopic, QueryType};
use mrs_common::db::projects::{self, NewProject};
use mrs_common::db::results::{load_results, ResultsFilter};
use mrs_common::db::{queries, topics, users};
use mrs_common::ids::new_id;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("mrs.db")).await.unwrap();
    (dir, pool)
}

async fn create_user(pool: &SqlitePool, email: &str) -> String {
    users::create_user_with_password(pool, email, "Test User", "hash")
        .await
        .unwrap()
        .id
}

fn acme_bank() -> NewProject {
    NewProject {
        name: "Acme Bank".into(),
        url: "https://acme.example".into(),
        sector: "banking".into(),
        region: "Spain".into(),
        language: "Spanish".into(),
        description: "Digital-first retail bank".into(),
    }
}

fn wizard_topics() -> Vec<NewTopic> {
    vec![
        NewTopic {
            name: "Fees".into(),
            description: Some("Account and transfer costs".into()),
            queries: vec![
                NewQuery {
                    text: "Which bank has the lowest transfer fees?".into(),
                    query_type: QueryType::Sector,
                },
                NewQuery {
                    text: "What are Acme Bank's overdraft fees?".into(),
                    query_type: QueryType::Product,
                },
            ],
        },
        NewTopic {
            name: "Mobile".into(),
            description: None,
            queries: vec![],
        },
    ]
}

#[tokio::test]
async fn test_create_project_with_topics() {
    let (_dir, pool) = setup().await;
    let user_id = create_user(&pool, "owner@example.com").await;

    let project = projects::create_project(&pool, &acme_bank(), &user_id, &wizard_topics())
        .await
        .unwrap();
    assert_eq!(project.slug, "acme-bank");

    let membership = projects::get_membership(&pool, &project.id, &user_id)
        .await
        .unwrap()
        .expect("creator membership");
    assert_eq!(membership.role, MembershipRole::Admin);

    let overview = projects::get_project_overview(&pool, project.clone(), membership.role)
        .await
        .unwrap();
    assert_eq!(overview.topics.len(), 2);
    assert_eq!(overview.topics[0].topic.name, "Fees");
    assert_eq!(overview.topics[0].queries.len(), 2);
    assert!(overview.topics[0]
        .queries
        .iter()
        .all(|q| q.country.as_deref() == Some("Spain") && q.active));
    assert_eq!(overview.topics[1].queries.len(), 0);
}

#[tokio::test]
async fn test_slug_collision_appends_suffix() {
    let (_dir, pool) = setup().await;
    let user_id = create_user(&pool, "owner@example.com").await;

    let first = projects::create_project(&pool, &acme_bank(), &user_id, &[]).await.unwrap();
    let second = projects::create_project(&pool, &acme_bank(), &user_id, &[]).await.unwrap();

    assert_eq!(first.slug, "acme-bank");
    assert_ne!(second.slug, first.slug);
    assert!(second.slug.starts_with("acme-bank-"));
    assert_eq!(second.slug.len(), "acme-bank-".len() + 4);
}

#[tokio::test]
async fn test_failed_creation_writes_nothing() {
    let (_dir, pool) = setup().await;

    // Unknown creator violates the users foreign key after the slug check
    let result = projects::create_project(&pool, &acme_bank(), "no-such-user", &wizard_topics()).await;
    assert!(result.is_err());

    let projects: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(&pool)
        .await
        .unwrap();
    let topics: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(projects, 0);
    assert_eq!(topics, 0);
}

#[tokio::test]
async fn test_list_projects_only_for_members() {
    let (_dir, pool) = setup().await;
    let owner = create_user(&pool, "owner@example.com").await;
    let outsider = create_user(&pool, "outsider@example.com").await;

    projects::create_project(&pool, &acme_bank(), &owner, &[]).await.unwrap();

    assert_eq!(projects::list_projects_for_user(&pool, &owner).await.unwrap().len(), 1);
    assert!(projects::list_projects_for_user(&pool, &outsider).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_project_cascades() {
    let (_dir, pool) = setup().await;
    let user_id = create_user(&pool, "owner@example.com").await;
    let project = projects::create_project(&pool, &acme_bank(), &user_id, &wizard_topics())
        .await
        .unwrap();
    seed_results(&pool, &project.id).await;

    assert!(projects::delete_project(&pool, &project.id).await.unwrap());

    for table in [
        "topics",
        "queries",
        "projects_users",
        "executions",
        "query_executions",
        "sources",
        "domains",
        "competitors",
        "mentions",
    ] {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0, "{} not cascaded", table);
    }
}

#[tokio::test]
async fn test_delete_topic_cascades_queries() {
    let (_dir, pool) = setup().await;
    let user_id = create_user(&pool, "owner@example.com").await;
    let project = projects::create_project(&pool, &acme_bank(), &user_id, &wizard_topics())
        .await
        .unwrap();
    let topic_ids = topics::list_topic_ids(&pool, &project.id).await.unwrap();
    let fees = &topic_ids[0];

    assert!(topics::delete_topic(&pool, fees).await.unwrap());
    assert!(queries::list_queries_for_topic(&pool, fees).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_insert_unique_queries_skips_duplicates() {
    let (_dir, pool) = setup().await;
    let user_id = create_user(&pool, "owner@example.com").await;
    let project = projects::create_project(&pool, &acme_bank(), &user_id, &wizard_topics())
        .await
        .unwrap();
    let topic_id = topics::list_topic_ids(&pool, &project.id).await.unwrap()[0].clone();

    let mut conn = pool.acquire().await.unwrap();
    let inserted = queries::insert_unique_queries(
        &mut conn,
        &topic_id,
        &project.id,
        Some("Spain"),
        vec![
            NewQuery {
                text: "which bank has the lowest TRANSFER fees?".into(),
                query_type: QueryType::Sector,
            },
            NewQuery {
                text: "Does Acme Bank charge for SEPA transfers?".into(),
                query_type: QueryType::Product,
            },
        ],
    )
    .await
    .unwrap();
    drop(conn);

    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].query_type, QueryType::Product);
    assert_eq!(queries::list_queries_for_topic(&pool, &topic_id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_competitor_name_unique_per_project() {
    let (_dir, pool) = setup().await;
    let user_id = create_user(&pool, "owner@example.com").await;
    let project = projects::create_project(&pool, &acme_bank(), &user_id, &[]).await.unwrap();

    let insert = |name: &'static str| {
        let pool = pool.clone();
        let project_id = project.id.clone();
        async move {
            sqlx::query("INSERT INTO competitors (id, project_id, name) VALUES (?, ?, ?)")
                .bind(new_id())
                .bind(project_id)
                .bind(name)
                .execute(&pool)
                .await
        }
    };

    insert("Globex").await.unwrap();
    assert!(insert("Globex").await.is_err());

    let count: i64 = sqlx::query_scalar("SELECT mention_count FROM competitors WHERE name = 'Globex'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0, "mention_count defaults to 0");
}

#[tokio::test]
async fn test_job_claim_lifecycle() {
    let (_dir, pool) = setup().await;

    let job = jobs::insert_job(
        &pool,
        &NewJob {
            kind: "generate-queries-for-topic".into(),
            payload: serde_json::json!({"topic_id": "t1"}),
            project_id: None,
            parent_id: None,
            max_attempts: 3,
        },
    )
    .await
    .unwrap();

    let now = Utc::now().timestamp_millis();
    let claimed = jobs::claim_next(&pool, now).await.unwrap().expect("job ready");
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert_eq!(claimed.attempts, 1);

    // Nothing else ready while the only job is running
    assert!(jobs::claim_next(&pool, now).await.unwrap().is_none());

    // Rescheduled into the future: not claimable yet
    jobs::reschedule(&pool, &job.id, "boom", now + 60_000).await.unwrap();
    assert!(jobs::claim_next(&pool, now).await.unwrap().is_none());

    let retried = jobs::claim_next(&pool, now + 60_000).await.unwrap().unwrap();
    assert_eq!(retried.attempts, 2);
    assert_eq!(retried.last_error.as_deref(), Some("boom"));

    jobs::mark_completed(&pool, &job.id, &serde_json::json!({"queriesGenerated": 10}))
        .await
        .unwrap();
    let done = jobs::get_job(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.output_json().unwrap()["queriesGenerated"], 10);
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_slugs() {
    // Given: several onboardings racing for the same name
    let (_dir, pool) = setup().await;
    let user_id = create_user(&pool, "owner@example.com").await;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let pool = pool.clone();
            let user_id = user_id.clone();
            tokio::spawn(async move {
                projects::create_project(&pool, &acme_bank(), &user_id, &wizard_topics()).await
            })
        })
        .collect();

    // When: all of them finish
    let mut slugs = Vec::new();
    for handle in handles {
        let project = handle.await.unwrap().expect("create should survive lock contention");
        slugs.push(project.slug);
    }

    // Then: every project got its own slug and its topics
    slugs.sort();
    slugs.dedup();
    assert_eq!(slugs.len(), 6);
    assert!(slugs.contains(&"acme-bank".to_string()));
    let topic_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM topics")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(topic_count, 6 * wizard_topics().len() as i64);
}

fn stale_job(max_attempts: i64) -> NewJob {
    NewJob {
        kind: "generate-initial-queries".into(),
        payload: serde_json::json!({}),
        project_id: None,
        parent_id: None,
        max_attempts,
    }
}

#[tokio::test]
async fn test_recover_running_requeues_stale_jobs() {
    let (_dir, pool) = setup().await;
    let job = jobs::insert_job(&pool, &stale_job(3)).await.unwrap();

    jobs::claim_next(&pool, Utc::now().timestamp_millis()).await.unwrap();
    let recovered = jobs::recover_running(&pool).await.unwrap();

    assert_eq!(recovered, jobs::RecoveredJobs { requeued: 1, failed: 0 });
    let stored = jobs::get_job(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Queued);
    assert_eq!(stored.attempts, 1);
}

#[tokio::test]
async fn test_recover_running_fails_job_on_last_attempt() {
    // Given: a job that keeps dying mid-run
    let (_dir, pool) = setup().await;
    let job = jobs::insert_job(&pool, &stale_job(2)).await.unwrap();

    // When: it is interrupted on every allowed attempt
    for _ in 0..2 {
        let claimed = jobs::claim_next(&pool, Utc::now().timestamp_millis())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, job.id);
        jobs::recover_running(&pool).await.unwrap();
    }

    // Then: it is not requeued again
    let stored = jobs::get_job(&pool, &job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempts, 2);
    assert_eq!(stored.last_error.as_deref(), Some(jobs::INTERRUPTED_ERROR));
    assert!(jobs::claim_next(&pool, Utc::now().timestamp_millis())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_results_filtered_by_execution() {
    let (_dir, pool) = setup().await;
    let user_id = create_user(&pool, "owner@example.com").await;
    let project = projects::create_project(&pool, &acme_bank(), &user_id, &wizard_topics())
        .await
        .unwrap();
    let (older, latest) = seed_results(&pool, &project.id).await;

    let all = load_results(&pool, &project.id, &ResultsFilter::default()).await.unwrap();
    assert_eq!(all.summary.total_executions, 2);
    assert_eq!(all.executions[0].id, latest);
    // Latest execution has a single query execution
    assert_eq!(all.summary.queries_processed, 1);
    assert_eq!(all.summary.sources_found, 3);
    assert_eq!(all.summary.competitors_identified, 2);
    assert_eq!(all.competitors[0].name, "Globex");
    assert_eq!(all.domains[0].name, "news.example");
    assert_eq!(all.domains[0].source_count, 2);

    let filtered = load_results(
        &pool,
        &project.id,
        &ResultsFilter {
            execution_id: Some(older.clone()),
            mentioned_only: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(filtered.selected_execution_id.as_deref(), Some(older.as_str()));
    assert_eq!(filtered.summary.queries_processed, 2);
    assert_eq!(filtered.summary.sources_found, 2);
    assert!(filtered.sources.iter().all(|s| s.domain_name.is_some()));
    // Initech has no mentions and is hidden; Globex has exactly one
    assert_eq!(filtered.competitors.len(), 1);
    assert_eq!(filtered.competitors[0].mention_count, 1);
    assert_eq!(filtered.models.iter().map(|m| m.query_executions).sum::<i64>(), 2);

    // Unknown execution id falls back to unfiltered
    let unknown = load_results(
        &pool,
        &project.id,
        &ResultsFilter {
            execution_id: Some(new_id()),
            mentioned_only: false,
        },
    )
    .await
    .unwrap();
    assert!(unknown.selected_execution_id.is_none());
    assert_eq!(unknown.summary.sources_found, 3);
}

/// Insert two executions with sources and competitors; returns (older, latest)
async fn seed_results(pool: &SqlitePool, project_id: &str) -> (String, String) {
    let chatgpt: String = sqlx::query_scalar("SELECT id FROM models WHERE name = 'ChatGPT'")
        .fetch_one(pool)
        .await
        .unwrap();
    let claude: String = sqlx::query_scalar("SELECT id FROM models WHERE name = 'Claude'")
        .fetch_one(pool)
        .await
        .unwrap();

    let older = new_id();
    let latest = new_id();
    for (id, at) in [
        (&older, Utc::now() - Duration::days(2)),
        (&latest, Utc::now()),
    ] {
        sqlx::query("INSERT INTO executions (id, project_id, executed_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(project_id)
            .bind(at)
            .execute(pool)
            .await
            .unwrap();
    }

    let qe_old_a = new_id();
    let qe_old_b = new_id();
    let qe_new = new_id();
    for (qe, exec, model) in [
        (&qe_old_a, &older, &chatgpt),
        (&qe_old_b, &older, &claude),
        (&qe_new, &latest, &chatgpt),
    ] {
        sqlx::query(
            "INSERT INTO query_executions (id, execution_id, model_id, response) VALUES (?, ?, ?, 'ok')",
        )
        .bind(qe)
        .bind(exec)
        .bind(model)
        .execute(pool)
        .await
        .unwrap();
    }

    let news = new_id();
    let blog = new_id();
    for (id, name) in [(&news, "news.example"), (&blog, "blog.example")] {
        sqlx::query("INSERT INTO domains (id, project_id, name, category) VALUES (?, ?, ?, 'media')")
            .bind(id)
            .bind(project_id)
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    let source_a = new_id();
    for (id, domain, qe, url) in [
        (&source_a, &news, &qe_old_a, "https://news.example/a"),
        (&new_id(), &news, &qe_old_b, "https://news.example/b"),
        (&new_id(), &blog, &qe_new, "https://blog.example/c"),
    ] {
        sqlx::query(
            "INSERT INTO sources (id, domain_id, project_id, url, query_execution_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(domain)
        .bind(project_id)
        .bind(url)
        .bind(qe)
        .execute(pool)
        .await
        .unwrap();
    }

    // Same URL twice within one query execution is rejected
    let dup = sqlx::query(
        "INSERT INTO sources (id, project_id, url, query_execution_id) VALUES (?, ?, 'https://news.example/a', ?)",
    )
    .bind(new_id())
    .bind(project_id)
    .bind(&qe_old_a)
    .execute(pool)
    .await;
    assert!(dup.is_err());

    let globex = new_id();
    sqlx::query(
        "INSERT INTO competitors (id, project_id, name, mention_count, last_mention_date) VALUES (?, ?, 'Globex', 1, ?)",
    )
    .bind(&globex)
    .bind(project_id)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO competitors (id, project_id, name) VALUES (?, ?, 'Initech')")
        .bind(new_id())
        .bind(project_id)
        .execute(pool)
        .await
        .unwrap();

    sqlx::query("INSERT INTO mentions (id, source_id, competitor_id) VALUES (?, ?, ?)")
        .bind(new_id())
        .bind(&source_a)
        .bind(&globex)
        .execute(pool)
        .await
        .unwrap();
    let dup_mention = sqlx::query("INSERT INTO mentions (id, source_id, competitor_id) VALUES (?, ?, ?)")
        .bind(new_id())
        .bind(&source_a)
        .bind(&globex)
        .execute(pool)
        .await;
    assert!(dup_mention.is_err());

    (older, latest)
}
