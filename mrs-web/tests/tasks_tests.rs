//! Background job integration tests
//!
//! Tests cover:
//! - create-topics-and-queries → generate-initial-queries → per-topic fan-out
//! - Duplicate filtering of generated queries
//! - Retry with backoff on provider failure
//! - Immediate failure for missing entities
//! - Recovery of jobs interrupted by a crash
//! - Job status endpoint

mod helpers;

use axum::http::StatusCode;
use helpers::{get_request, TestApp};
use mrs_common::db::jobs::JobStatus;
use mrs_common::db::{settings, topics};
use mrs_web::tasks::worker::run_until_idle;
use mrs_web::tasks::JobKind;
use serde_json::json;

fn generated_topics() -> String {
    json!({
        "topics": [
            {
                "topic": "Savings",
                "description": "Savings accounts and deposits",
                "queries": [
                    { "text": "Which bank is best in Spain?", "queryType": "sector" },
                    { "text": "Does Acme Bank offer fixed-term deposits?", "queryType": "product" }
                ]
            },
            {
                "topic": "Fees",
                "description": "Account and transfer costs",
                "queries": [
                    { "text": "Which bank is best in Spain?", "queryType": "sector" },
                    { "text": "What does Acme Bank charge for transfers?", "queryType": "product" }
                ]
            }
        ]
    })
    .to_string()
}

fn generated_queries() -> String {
    json!({
        "queries": [
            { "text": "WHICH bank is  best in Spain?", "queryType": "sector" },
            { "text": "Which banks have no monthly fees?", "queryType": "sector" },
            { "text": "which banks have no monthly fees?", "queryType": "product" }
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_project_pipeline_fans_out_per_topic() {
    // Given: a new project and scripted generations for every step
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    let created = app.create_project(&token, "Acme Bank").await;
    let project_id = created["id"].as_str().unwrap();
    app.openai.push(generated_topics());
    app.openai.push(generated_queries());
    app.openai.push(generated_queries());

    // When: the queue drains
    let executed = run_until_idle(&app.state).await.unwrap();

    // Then: one topics job, one fan-out job, one job per topic
    assert_eq!(executed, 4);

    let root = app
        .state
        .jobs
        .get(created["run"]["id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.status, JobStatus::Completed);
    let root_output = root.output_json().unwrap();
    assert_eq!(root_output["topicsCreated"], 2);
    assert_eq!(root_output["queriesCreated"], 4);

    let initial = app.state.jobs.children(&root.id).await.unwrap();
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].kind, "generate-initial-queries");
    let initial_output = initial[0].output_json().unwrap();
    assert_eq!(initial_output["additionalQueriesGenerated"], 2);
    assert_eq!(initial_output["batch"].as_array().unwrap().len(), 2);

    let per_topic = app.state.jobs.children(&initial[0].id).await.unwrap();
    assert_eq!(per_topic.len(), 2);
    for job in &per_topic {
        assert_eq!(job.kind, "generate-queries-for-topic");
        assert_eq!(job.status, JobStatus::Completed);
        let output = job.output_json().unwrap();
        // Only one of the three generated texts is new
        assert_eq!(output["queriesGenerated"], 1);
        assert_eq!(output["queries"], json!(["Which banks have no monthly fees?"]));
    }

    let stored = topics::list_topics_with_queries(&app.state.db, project_id).await.unwrap();
    assert_eq!(stored.len(), 2);
    for topic in stored {
        assert_eq!(topic.queries.len(), 3, "topic {}", topic.topic.name);
        assert!(topic.queries.iter().all(|q| q.country.as_deref() == Some("Spain")));
    }

    // The per-topic prompt lists the queries to avoid
    let requests = app.openai.requests();
    assert_eq!(requests.len(), 3);
    let prompt = &requests[1].messages.last().unwrap().content;
    assert!(prompt.contains("Which bank is best in Spain?"));
}

#[tokio::test]
async fn test_missing_topic_fails_without_retry() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    let created = app.create_project(&token, "Acme Bank").await;
    let project_id = created["id"].as_str().unwrap();
    // Drop the queued topics job so only the orphan runs
    sqlx::query("DELETE FROM jobs").execute(&app.state.db).await.unwrap();

    let job = app
        .state
        .jobs
        .enqueue(
            JobKind::GenerateQueriesForTopic,
            json!({ "topic_id": "5d41402a-bc4b-4a76-b971-9d911017c592" }),
            project_id,
            None,
        )
        .await
        .unwrap();

    let mut rx = app.state.event_bus.subscribe();
    run_until_idle(&app.state).await.unwrap();

    let job = app.state.jobs.get(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.last_error.as_deref(), Some("Topic not found"));
    assert!(app.openai.requests().is_empty());

    let failed = std::iter::from_fn(|| rx.try_recv().ok())
        .find(|e| e.event_type() == "JobFailed")
        .unwrap();
    assert!(matches!(
        failed,
        mrs_common::events::MrsEvent::JobFailed { will_retry: false, .. }
    ));
}

#[tokio::test]
async fn test_invalid_payload_fails_without_retry() {
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    let created = app.create_project(&token, "Acme Bank").await;
    sqlx::query("DELETE FROM jobs").execute(&app.state.db).await.unwrap();

    let job = app
        .state
        .jobs
        .enqueue(
            JobKind::GenerateInitialQueries,
            json!({ "project": "wrong field" }),
            created["id"].as_str().unwrap(),
            None,
        )
        .await
        .unwrap();

    run_until_idle(&app.state).await.unwrap();

    let job = app.state.jobs.get(&job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
}

#[tokio::test]
async fn test_provider_failure_is_rescheduled() {
    // Given: no scripted response, so the topics request fails
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    let created = app.create_project(&token, "Acme Bank").await;

    // When: the queue drains
    let executed = run_until_idle(&app.state).await.unwrap();

    // Then: the job ran once and waits for its backoff
    assert_eq!(executed, 1);
    let job = app
        .state
        .jobs
        .get(created["run"]["id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.is_some());
    assert!(job.run_at > chrono::Utc::now().timestamp_millis());
}

#[tokio::test]
async fn test_unreadable_retry_setting_still_reschedules() {
    // Given: a queued job and a settings table that can no longer be read
    let app = TestApp::new().await;
    let token = app.sign_up("ana@acme.example").await;
    let created = app.create_project(&token, "Acme Bank").await;
    sqlx::query("DROP TABLE settings").execute(&app.state.db).await.unwrap();

    // When: the attempt fails
    run_until_idle(&app.state).await.unwrap();

    // Then: the default backoff applies and the job is not left running
    let job = app
        .state
        .jobs
        .get(created["run"]["id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.run_at > chrono::Utc::now().timestamp_millis());
}

#[tokio::test]
async fn test_recover_stale_fails_exhausted_jobs() {
    let app = TestApp::new().await;
    settings::set_setting(&app.state.db, settings::JOB_MAX_ATTEMPTS, "1")
        .await
        .unwrap();
    let token = app.sign_up("ana@acme.example").await;
    let created = app.create_project(&token, "Acme Bank").await;
    let job_id = created["run"]["id"].as_str().unwrap();

    // A worker claims the job, then the process dies
    app.state.jobs.claim_next().await.unwrap().unwrap();
    let recovered = app.state.jobs.recover_stale().await.unwrap();

    assert_eq!(recovered.failed, 1);
    assert_eq!(recovered.requeued, 0);
    let job = app.state.jobs.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_last_attempt_failure_is_final() {
    let app = TestApp::new().await;
    settings::set_setting(&app.state.db, settings::JOB_MAX_ATTEMPTS, "1")
        .await
        .unwrap();
    let token = app.sign_up("ana@acme.example").await;
    let created = app.create_project(&token, "Acme Bank").await;

    run_until_idle(&app.state).await.unwrap();

    let job = app
        .state
        .jobs
        .get(created["run"]["id"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.max_attempts, 1);
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_job_status_endpoint() {
    let app = TestApp::new().await;
    let ana = app.sign_up("ana@acme.example").await;
    let bob = app.sign_up("bob@globex.example").await;
    let created = app.create_project(&ana, "Acme Bank").await;
    let run_id = created["run"]["id"].as_str().unwrap();
    app.openai.push(json!({ "topics": [] }).to_string());

    run_until_idle(&app.state).await.unwrap();

    let (status, body) = app
        .send(get_request(&format!("/api/jobs/{run_id}"), Some(&ana)))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["output"]["topicsCreated"], 0);
    assert_eq!(body["data"]["children"][0]["kind"], "generate-initial-queries");
    assert_eq!(body["data"]["children"][0]["status"], "completed");

    let (status, body) = app
        .send(get_request(&format!("/api/jobs/{run_id}"), Some(&bob)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Unauthorized");

    let (status, body) = app
        .send(get_request("/api/jobs/not-a-job", Some(&ana)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");
}
