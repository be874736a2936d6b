//! Market research service (mrs-web) - Main entry point
//!
//! Serves the form actions, AI completion routes, read views and SSE feed,
//! and runs the background job workers in the same process.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mrs_common::config::{self, TomlConfig, DEFAULT_PORT};
use mrs_common::db::{settings, users};
use mrs_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mrs_web::config::resolve_secrets;
use mrs_web::tasks::{JobQueue, WorkerPool};
use mrs_web::webhook::AnalysisWebhook;
use mrs_web::{build_router, AppState, Providers};

const EVENT_BUS_CAPACITY: usize = 1000;

/// Command-line arguments for mrs-web
#[derive(Parser, Debug)]
#[command(name = "mrs-web")]
#[command(about = "Market research service: organizations, topics, queries and AI generation")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "MRS_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "MRS_DATABASE")]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, env = "MRS_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MRS_PORT")]
    port: Option<u16>,

    /// Number of background job workers
    #[arg(short, long, env = "MRS_WORKERS")]
    workers: Option<usize>,
}

fn init_tracing(toml_config: &TomlConfig) {
    let default_filter = format!(
        "mrs_web={level},mrs_common={level},mrs_ai={level},tower_http=info",
        level = toml_config.logging.level
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config.as_deref());
    let toml_config = config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_tracing(&toml_config);

    info!(
        "Starting mrs-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = args
        .database
        .or_else(|| toml_config.database_path.clone())
        .unwrap_or_else(config::default_database_path);
    info!("Database: {}", db_path.display());

    let db = mrs_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let secrets = resolve_secrets(&db, &toml_config)
        .await
        .context("Failed to resolve secrets")?;
    let providers =
        Providers::from_config(&secrets, &toml_config.ai).context("Failed to build AI clients")?;
    let webhook = AnalysisWebhook::new(secrets.analysis_webhook_url.clone())
        .context("Failed to build analysis webhook client")?;

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let lock_wait_ms = settings::get_u64(&db, settings::DATABASE_MAX_LOCK_WAIT_MS, 5000)
        .await
        .context("Failed to read lock wait setting")?;
    let jobs = JobQueue::new(db.clone(), event_bus.clone()).with_lock_wait(lock_wait_ms);

    let mut state = AppState::new(db.clone(), event_bus, providers, webhook).with_jobs(jobs);
    if let Some(days) = toml_config.session_ttl_days {
        state = state.with_session_ttl(chrono::Duration::days(days));
    }

    let recovered = state
        .jobs
        .recover_stale()
        .await
        .context("Failed to recover interrupted jobs")?;
    if recovered.requeued + recovered.failed > 0 {
        warn!(
            "Recovered {} jobs interrupted by the previous shutdown ({} failed on their last attempt)",
            recovered.requeued + recovered.failed,
            recovered.failed
        );
    }
    let purged = users::purge_expired_sessions(&db, chrono::Utc::now())
        .await
        .context("Failed to purge expired sessions")?;
    info!("Purged {} expired sessions", purged);

    let shutdown = state.shutdown.clone();
    let worker_count = args.workers.unwrap_or(toml_config.workers.count);
    let workers = WorkerPool::new(
        state.clone(),
        worker_count,
        Duration::from_millis(toml_config.workers.poll_interval_ms),
    )
    .spawn(shutdown.clone());

    let app = build_router(state);

    let bind = args
        .bind
        .or_else(|| toml_config.bind_address.clone())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args.port.or(toml_config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", bind, port))?;

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Cancelling the token ends open SSE streams so the drain completes
    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal_token.cancel();
        })
        .await
        .context("Server error")?;

    info!("Stopping job workers");
    shutdown.cancel();
    for handle in workers {
        if let Err(e) = handle.await {
            warn!("Worker task ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
