//! OpenAI Responses API client
//!
//! `POST {base}/v1/responses`. Web search uses the `web_search_preview`
//! tool with a forced tool choice; structured output uses
//! `text.format = json_schema`.

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

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4.1";
const PROVIDER: &str = "OpenAI";
const USER_AGENT: &str = concat!("mrs/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    rate_limiter: DefaultDirectRateLimiter,
}

impl OpenAiClient {
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
            .post(format!("{}/v1/responses", self.base_url))
            .bearer_auth(api_key)
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

/// Translate a request into the Responses API body
pub fn request_body(request: &CompletionRequest, stream: bool) -> Value {
    let input: Vec<Value> = request
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
        "input": input,
        "temperature": request.temperature,
        "max_output_tokens": request.max_tokens,
        "stream": stream,
    });

    if let Some(system) = &request.system {
        body["instructions"] = json!(system);
    }
    if request.web_search {
        body["tools"] = json!([{ "type": "web_search_preview" }]);
        body["tool_choice"] = json!({ "type": "web_search_preview" });
    }
    if let Some(output) = &request.output {
        body["text"] = json!({
            "format": {
                "type": "json_schema",
                "name": output.name,
                "schema": output.schema,
                "strict": true
            }
        });
    }
    body
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum OutputItem {
    #[serde(rename = "message")]
    Message {
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "output_text")]
    OutputText { text: String },
    #[serde(other)]
    Other,
}

fn output_text(body: ResponsesBody) -> Result<String, AiError> {
    let text: String = body
        .output
        .into_iter()
        .filter_map(|item| match item {
            OutputItem::Message { content } => Some(content),
            OutputItem::Other => None,
        })
        .flatten()
        .filter_map(|part| match part {
            ContentPart::OutputText { text } => Some(text),
            ContentPart::Other => None,
        })
        .collect();

    if text.is_empty() {
        return Err(AiError::InvalidResponse(
            "response contained no output text".to_string(),
        ));
    }
    Ok(text)
}

/// Text delta carried by one stream event, if any
fn stream_delta(event: &SseEvent) -> Result<Option<String>, AiError> {
    if event.data == "[DONE]" {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(&event.data)?;
    match value["type"].as_str().unwrap_or_default() {
        "response.output_text.delta" => Ok(value["delta"].as_str().map(str::to_string)),
        "error" => Err(AiError::Stream(
            value["message"].as_str().unwrap_or("unknown error").to_string(),
        )),
        "response.failed" => Err(AiError::Stream(
            value["response"]["error"]["message"]
                .as_str()
                .unwrap_or("response failed")
                .to_string(),
        )),
        _ => Ok(None),
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiError> {
        debug!(model = %request.model, web_search = request.web_search, "OpenAI completion");
        let response = self.send(&request_body(request, false)).await?;
        let body: ResponsesBody = response.json().await?;
        output_text(body)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<TextStream, AiError> {
        debug!(model = %request.model, web_search = request.web_search, "OpenAI stream");
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
