//! Trigger for the external analysis automation
//!
//! The automation runs the queries against each model and writes executions,
//! sources and competitors back into the database. We only start it.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Analysis webhook is not configured")]
    NotConfigured,

    #[error("Analysis webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Analysis webhook returned status {0}")]
    Status(u16),
}

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    project_id: &'a str,
    models: &'a [String],
}

#[derive(Clone)]
pub struct AnalysisWebhook {
    client: reqwest::Client,
    url: Option<String>,
}

impl AnalysisWebhook {
    pub fn new(url: Option<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// POST `{project_id, models}` to the webhook
    pub async fn trigger(&self, project_id: &str, models: &[String]) -> Result<(), WebhookError> {
        let url = self.url.as_deref().ok_or(WebhookError::NotConfigured)?;

        let response = self
            .client
            .post(url)
            .json(&AnalysisRequest { project_id, models })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(project_id, status = status.as_u16(), "Analysis webhook rejected request");
            return Err(WebhookError::Status(status.as_u16()));
        }

        info!(project_id, models = models.len(), "Analysis run triggered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_trigger_posts_project_and_models() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::Json(serde_json::json!({
                "project_id": "p1",
                "models": ["gpt-4.1", "claude-3-5-sonnet-latest"]
            })))
            .with_status(200)
            .create_async()
            .await;

        let webhook = AnalysisWebhook::new(Some(format!("{}/hook", server.url()))).unwrap();
        let models = vec!["gpt-4.1".to_string(), "claude-3-5-sonnet-latest".to_string()];
        webhook.trigger("p1", &models).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unconfigured_and_rejected() {
        let webhook = AnalysisWebhook::new(Some("  ".to_string())).unwrap();
        assert!(!webhook.is_configured());
        assert!(matches!(
            webhook.trigger("p1", &[]).await,
            Err(WebhookError::NotConfigured)
        ));

        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/hook").with_status(500).create_async().await;
        let webhook = AnalysisWebhook::new(Some(format!("{}/hook", server.url()))).unwrap();
        assert!(matches!(
            webhook.trigger("p1", &[]).await,
            Err(WebhookError::Status(500))
        ));
    }
}
