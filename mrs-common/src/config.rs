//! Configuration loading
//!
//! Bootstrap configuration lives in a TOML file. Every field has a compiled
//! default so a missing or partial file still yields a usable config.
//! Resolution order for values that can come from several places:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! Secrets (API keys, webhook URL) additionally consult the `settings` table
//! first; see [`resolve_layered`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MRS_CONFIG";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Bootstrap configuration read from TOML
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Listen address (default 127.0.0.1)
    #[serde(default)]
    pub bind_address: Option<String>,

    /// HTTP port
    #[serde(default)]
    pub port: Option<u16>,

    /// Session lifetime in days
    #[serde(default)]
    pub session_ttl_days: Option<i64>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// AI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// Override for the OpenAI API base URL (proxies, tests)
    #[serde(default)]
    pub openai_base_url: Option<String>,

    /// Override for the Anthropic API base URL
    #[serde(default)]
    pub anthropic_base_url: Option<String>,

    /// Outbound request quota per provider
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            openai_base_url: None,
            anthropic_base_url: None,
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

/// Background worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent job workers
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// Idle polling interval when no wake-up arrives
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// External analysis automation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisConfig {
    /// Webhook that starts an analysis run
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_worker_count() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    2000
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the config file if present, falling back to defaults
///
/// A missing file is not an error (first run); a file that exists but does
/// not parse is.
pub fn load_or_default(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let config = load_toml_config(path)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Pick the config file path: CLI argument, then `MRS_CONFIG`, then the
/// platform config directory
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_config_path()
}

/// `~/.config/mrs/config.toml` (or platform equivalent)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mrs")
        .join("config.toml")
}

/// Default database location under the platform data directory
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mrs")
        .join("mrs.db")
}

/// Where a layered value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Database,
    Environment,
    Toml,
}

impl ValueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueSource::Database => "database",
            ValueSource::Environment => "environment",
            ValueSource::Toml => "TOML",
        }
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Resolve a secret from database → environment → TOML
///
/// Logs a warning when more than one source provides a value, since the
/// lower-priority ones are silently ignored otherwise.
pub fn resolve_layered(
    name: &str,
    db_value: Option<String>,
    env_var: &str,
    toml_value: Option<&str>,
) -> Option<(String, ValueSource)> {
    let env_value = std::env::var(env_var).ok();

    let candidates = [
        (db_value, ValueSource::Database),
        (env_value, ValueSource::Environment),
        (toml_value.map(str::to_string), ValueSource::Toml),
    ];

    let valid: Vec<(String, ValueSource)> = candidates
        .into_iter()
        .filter_map(|(value, source)| value.filter(|v| is_valid_value(v)).map(|v| (v, source)))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(_, s)| s.as_str()).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            valid[0].1.as_str()
        );
    }

    let resolved = valid.into_iter().next();
    if let Some((_, source)) = &resolved {
        info!("{} loaded from {}", name, source.as_str());
    }
    resolved
}
