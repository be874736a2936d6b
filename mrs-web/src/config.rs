//! Secret resolution for mrs-web
//!
//! Provider API keys and the analysis webhook URL resolve
//! Database → ENV → TOML, so an operator can rotate a key through the
//! `settings` table without touching the deployment.

use mrs_common::config::{resolve_layered, TomlConfig};
use mrs_common::db::settings;
use mrs_common::Result;
use sqlx::SqlitePool;
use tracing::warn;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const ANALYSIS_WEBHOOK_URL_ENV: &str = "MRS_ANALYSIS_WEBHOOK_URL";

/// Resolved secrets; `None` means the integration is disabled
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub analysis_webhook_url: Option<String>,
}

pub async fn resolve_secrets(db: &SqlitePool, toml_config: &TomlConfig) -> Result<Secrets> {
    let openai_api_key = resolve_layered(
        "OpenAI API key",
        settings::get_setting(db, settings::OPENAI_API_KEY).await?,
        OPENAI_API_KEY_ENV,
        toml_config.ai.openai_api_key.as_deref(),
    )
    .map(|(value, _)| value);

    let anthropic_api_key = resolve_layered(
        "Anthropic API key",
        settings::get_setting(db, settings::ANTHROPIC_API_KEY).await?,
        ANTHROPIC_API_KEY_ENV,
        toml_config.ai.anthropic_api_key.as_deref(),
    )
    .map(|(value, _)| value);

    let analysis_webhook_url = resolve_layered(
        "Analysis webhook URL",
        settings::get_setting(db, settings::ANALYSIS_WEBHOOK_URL).await?,
        ANALYSIS_WEBHOOK_URL_ENV,
        toml_config.analysis.webhook_url.as_deref(),
    )
    .map(|(value, _)| value);

    if openai_api_key.is_none() {
        warn!(
            "OpenAI API key not configured; AI routes and background generation will fail. \
             Set {} or [ai] openai_api_key in the TOML config.",
            OPENAI_API_KEY_ENV
        );
    }
    if anthropic_api_key.is_none() {
        warn!("Anthropic API key not configured; /api/ai/chat/claude is disabled");
    }
    if analysis_webhook_url.is_none() {
        warn!("Analysis webhook URL not configured; analysis runs cannot be triggered");
    }

    Ok(Secrets {
        openai_api_key,
        anthropic_api_key,
        analysis_webhook_url,
    })
}
