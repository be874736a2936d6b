//! mrs-web library interface for testing
//!
//! Exposes the router, application state and background task layer so
//! integration tests can drive the service in-process.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod tasks;
pub mod validation;
pub mod webhook;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Duration, Utc};
use mrs_ai::anthropic::AnthropicClient;
use mrs_ai::openai::OpenAiClient;
use mrs_ai::{AiError, CompletionProvider};
use mrs_common::config::AiConfig;
use mrs_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Secrets;
use crate::tasks::JobQueue;
use crate::webhook::AnalysisWebhook;

/// Default session lifetime
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Completion providers behind the AI routes and tasks
#[derive(Clone)]
pub struct Providers {
    /// ChatGPT chat, company profile, topics and queries
    pub openai: Arc<dyn CompletionProvider>,
    /// Claude chat
    pub anthropic: Arc<dyn CompletionProvider>,
}

impl Providers {
    pub fn new(openai: Arc<dyn CompletionProvider>, anthropic: Arc<dyn CompletionProvider>) -> Self {
        Self { openai, anthropic }
    }

    /// HTTP clients for both vendors
    pub fn from_config(secrets: &Secrets, ai: &AiConfig) -> Result<Self, AiError> {
        let openai = OpenAiClient::new(
            secrets.openai_api_key.clone(),
            ai.openai_base_url.clone(),
            ai.requests_per_minute,
        )?;
        let anthropic = AnthropicClient::new(
            secrets.anthropic_api_key.clone(),
            ai.anthropic_base_url.clone(),
            ai.requests_per_minute,
        )?;
        Ok(Self::new(Arc::new(openai), Arc::new(anthropic)))
    }
}

/// Application state shared across handlers and workers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Change feed for SSE clients
    pub event_bus: EventBus,
    pub providers: Providers,
    pub jobs: JobQueue,
    pub webhook: AnalysisWebhook,
    pub session_ttl: Duration,
    /// Cancelled on shutdown; ends SSE streams and stops workers
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        providers: Providers,
        webhook: AnalysisWebhook,
    ) -> Self {
        let jobs = JobQueue::new(db.clone(), event_bus.clone());
        Self {
            db,
            event_bus,
            providers,
            jobs,
            webhook,
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_jobs(mut self, jobs: JobQueue) -> Self {
        self.jobs = jobs;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::action_routes())
        .merge(api::ai_routes())
        .merge(api::project_routes())
        .merge(api::results_routes())
        .merge(api::job_routes())
        .route("/api/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
