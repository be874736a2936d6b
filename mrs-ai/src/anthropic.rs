//! Anthropic Messages API client
//!
//! `POST {base}/v1/messages`. Web search is the `web_search_20250305`
//! server tool. The Messages API has no schema-constrained output mode, so
//! the schema is appended to the system prompt instead.

use crate::provider::{CompletionProvider, CompletionRequest, Role, TextStream};
use crate::sse::{SseEvent, SseParser};
use crate::AiError;
use async_trait::async_trait;
use futures::StreamExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub const API_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "Anthropic";
const USER_AGENT: &str = concat!("mrs/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const WEB_SEARCH_MAX_USES: u32 = 5;

pub struct AnthropicClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    rate_limiter: DefaultDirectRateLimiter,
}

impl AnthropicClient {
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        requests_per_minute: u32,
    ) -> Result<Self, AiError> {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, AiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AiError::MissingApiKey(PROVIDER))?;

        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

fn system_prompt(request: &CompletionRequest) -> Option<String> {
    let schema_note = request.output.as_ref().map(|output| {
        format!(
            "Respond with a single JSON object named {} that matches this JSON schema, and nothing else:\n{}",
            output.name, output.schema
        )
    });

    match (&request.system, schema_note) {
        (Some(system), Some(note)) => Some(format!("{system}\n\n{note}")),
        (Some(system), None) => Some(system.clone()),
        (None, note) => note,
    }
}

/// Translate a request into the Messages API body
pub fn request_body(request: &CompletionRequest, stream: bool) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            json!({ "role": role, "content": m.content })
        })
        .collect();

    let model = if request.model.is_empty() {
        DEFAULT_MODEL
    } else {
        request.model.as_str()
    };

    let mut body = json!({
        "model": model,
        "max_tokens": request.max_tokens,
        "messages": messages,
        "temperature": request.temperature,
        "stream": stream,
    });

    if let Some(system) = system_prompt(request) {
        body["system"] = json!(system);
    }
    if request.web_search {
        body["tools"] = json!([{
            "type": "web_search_20250305",
            "name": "web_search",
            "max_uses": WEB_SEARCH_MAX_USES
        }]);
    }
    body
}

#[derive(Debug, Deserialize)]
struct MessagesBody {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

fn message_text(body: MessagesBody) -> Result<String, AiError> {
    let text: String = body
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect();

    if text.is_empty() {
        return Err(AiError::InvalidResponse(
            "message contained no text blocks".to_string(),
        ));
    }
    Ok(text)
}

fn stream_delta(event: &SseEvent) -> Result<Option<String>, AiError> {
    let value: Value = serde_json::from_str(&event.data)?;
    match value["type"].as_str().unwrap_or_default() {
        "content_block_delta" if value["delta"]["type"] == "text_delta" => {
            Ok(value["delta"]["text"].as_str().map(str::to_string))
        }
        "error" => Err(AiError::Stream(
            value["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        )),
        _ => Ok(None),
    }
}

#[async_trait]
impl CompletionProvider for AnthropicClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        debug!(model = %request.model, web_search = request.web_search, "Anthropic completion");
        let response = self.send(&request_body(request, false)).await?;
        let body: MessagesBody = response.json().await?;
        message_text(body)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, AiError> {
        debug!(model = %request.model, web_search = request.web_search, "Anthropic stream");
        let response = self.send(&request_body(request, true)).await?;
        let mut bytes = Box::pin(response.bytes_stream());

        let stream = async_stream::try_stream! {
            let mut parser = SseParser::default();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(AiError::from)?;
                for event in parser.push(&chunk) {
                    if let Some(delta) = stream_delta(&event)? {
                        yield delta;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
