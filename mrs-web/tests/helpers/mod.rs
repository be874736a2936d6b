//! Shared fixtures for mrs-web integration tests
//!
//! Each test gets its own SQLite file in a temp dir and scripted completion
//! providers, so nothing here touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::stream;
use http_body_util::BodyExt;
use mrs_ai::{AiError, CompletionProvider, CompletionRequest, TextStream};
use mrs_common::events::EventBus;
use mrs_web::webhook::AnalysisWebhook;
use mrs_web::{build_router, AppState, Providers};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

/// Completion provider that replays queued responses
pub struct ScriptedProvider {
    name: &'static str,
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    chunk_size: usize,
}

impl ScriptedProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            chunk_size: 7,
        }
    }

    pub fn push(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(response.into());
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &CompletionRequest) -> Result<String, AiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(AiError::Api {
                provider: self.name,
                status: 500,
                message: "no scripted response".to_string(),
            })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        self.next(request)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, AiError> {
        let text = self.next(request)?;
        let chars: Vec<char> = text.chars().collect();
        let chunks: Vec<Result<String, AiError>> = chars
            .chunks(self.chunk_size)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

pub struct TestApp {
    _dir: TempDir,
    pub state: AppState,
    pub openai: Arc<ScriptedProvider>,
    pub anthropic: Arc<ScriptedProvider>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_webhook(None).await
    }

    pub async fn with_webhook(webhook_url: Option<String>) -> Self {
        let dir = TempDir::new().unwrap();
        let db = mrs_common::db::init_database(&dir.path().join("mrs.db"))
            .await
            .unwrap();

        let openai = Arc::new(ScriptedProvider::new("OpenAI"));
        let anthropic = Arc::new(ScriptedProvider::new("Anthropic"));
        let providers = Providers::new(openai.clone(), anthropic.clone());
        let webhook = AnalysisWebhook::new(webhook_url).unwrap();

        let state = AppState::new(db, EventBus::new(100), providers, webhook);
        Self {
            _dir: dir,
            state,
            openai,
            anthropic,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Raw response text, for streamed routes
    pub async fn send_text(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    /// Create an account and return its bearer token
    pub async fn sign_up(&self, email: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "/api/auth/sign-up/email",
                None,
                serde_json::json!({
                    "email": email,
                    "password": "correct horse battery",
                    "name": "Test User"
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "sign-up failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Create an organization through the plain project form
    pub async fn create_project(&self, token: &str, name: &str) -> Value {
        let (status, body) = self
            .send(form_request("/actions/projects", Some(token), &company_fields(name)))
            .await;
        assert_eq!(status, StatusCode::OK, "create project failed: {body}");
        body["data"].clone()
    }

    pub async fn create_topic(&self, token: &str, project_id: &str, name: &str) -> String {
        let (status, body) = self
            .send(form_request(
                "/actions/topics",
                Some(token),
                &[
                    ("organizationId", project_id),
                    ("name", name),
                    ("description", "Topic description"),
                ],
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "create topic failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

pub fn company_fields(name: &str) -> Vec<(&str, &str)> {
    vec![
        ("name", name),
        ("websiteUrl", "acmebank.example"),
        ("sector", "banking"),
        ("country", "Spain"),
        ("language", "Spanish"),
        ("description", "Digital-first retail bank"),
    ]
}

fn with_auth(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub fn form_request(uri: &str, token: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    with_auth(Request::builder().method("POST").uri(uri), token)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    with_auth(Request::builder().method("POST").uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::builder().uri(uri), token)
        .body(Body::empty())
        .unwrap()
}
