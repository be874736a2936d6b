//! AI completion routes
//!
//! Chat routes stream plain text straight from the provider. Completion
//! routes ask for schema-shaped JSON, repair malformed unicode escapes and
//! validate the result before returning it. The suggested-topics route
//! streams its JSON document by default, repairing escapes chunk by chunk
//! so the body stays parseable; with `Accept: application/json` it returns
//! the parsed topics instead.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures::StreamExt;
use mrs_ai::decode::StreamingDecoder;
use mrs_ai::prompts::{self, CompanyContext, ExistingQuery, SingleQueryContext};
use mrs_ai::schemas::{parse_recommended_topics, parse_structured, AiGeneratedQuery, CompanyProfile, SuggestedTopic};
use mrs_ai::{CompletionProvider, CompletionRequest, TextStream};
use mrs_common::db::models::QueryType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::validation::{is_valid_website_url, normalize_website_url};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRequest {
    #[serde(default)]
    pub website_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestedTopicsRequest {
    pub website_url: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
}

/// Existing query as sent by the query form: bare text or `{text, queryType}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ExistingQueryInput {
    Text(String),
    Typed {
        text: String,
        #[serde(rename = "queryType", default)]
        query_type: Option<String>,
    },
}

impl From<ExistingQueryInput> for ExistingQuery {
    fn from(input: ExistingQueryInput) -> Self {
        match input {
            ExistingQueryInput::Text(text) => ExistingQuery {
                text,
                query_type: QueryType::Sector,
            },
            ExistingQueryInput::Typed { text, query_type } => ExistingQuery {
                text,
                query_type: query_type
                    .as_deref()
                    .and_then(QueryType::parse)
                    .unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryRequest {
    pub company_name: Option<String>,
    pub topic_name: Option<String>,
    pub topic_description: Option<String>,
    pub company_description: Option<String>,
    pub existing_queries: Vec<ExistingQueryInput>,
}

#[derive(Debug, Serialize)]
pub struct SuggestedTopics {
    pub topics: Vec<SuggestedTopic>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn text_response(stream: impl futures::Stream<Item = Result<String, mrs_ai::AiError>> + Send + 'static) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Log a provider failure that happens after the response has started
fn log_stream_errors(provider: &'static str, stream: TextStream) -> TextStream {
    Box::pin(stream.inspect(move |item| {
        if let Err(e) = item {
            warn!(provider, "Stream aborted: {}", e);
        }
    }))
}

async fn stream_chat(
    provider: &Arc<dyn CompletionProvider>,
    request: CompletionRequest,
) -> ApiResult<Response> {
    let stream = provider.stream(&request).await?;
    Ok(text_response(log_stream_errors(provider.name(), stream)))
}

fn require_prompt(req: ChatRequest) -> ApiResult<String> {
    non_blank(req.prompt).ok_or_else(|| ApiError::BadRequest("Prompt is required".to_string()))
}

/// POST /api/ai/chat/chatgpt
pub async fn chat_chatgpt(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<Response> {
    let prompt = require_prompt(req)?;
    stream_chat(&state.providers.openai, prompts::chatgpt_request(&prompt)).await
}

/// POST /api/ai/chat/claude
pub async fn chat_claude(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(req): ApiJson<ChatRequest>,
) -> ApiResult<Response> {
    let prompt = require_prompt(req)?;
    stream_chat(&state.providers.anthropic, prompts::claude_request(&prompt)).await
}

/// Required company website, `https://` prefixed when no scheme is given
fn company_website(raw: Option<String>) -> ApiResult<String> {
    let raw_url = non_blank(raw)
        .ok_or_else(|| ApiError::BadRequest("Company website url is required".to_string()))?;
    let url = normalize_website_url(&raw_url);
    if !is_valid_website_url(&url) {
        return Err(ApiError::BadRequest("Invalid company website url".to_string()));
    }
    Ok(url)
}

/// POST /api/ai/completion/company
pub async fn company_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(req): ApiJson<CompanyRequest>,
) -> ApiResult<Json<CompanyProfile>> {
    let url = company_website(req.website_url)?;

    let raw = state
        .providers
        .openai
        .complete(&prompts::company_profile_request(&url))
        .await?;
    let profile: CompanyProfile = parse_structured(&raw)?;

    info!(website = %url, "Company profile generated");
    Ok(Json(profile.with_known_sector()))
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}

/// Repair escapes in a streamed JSON document, holding back escapes split
/// across chunks
fn repaired_json(mut upstream: TextStream) -> impl futures::Stream<Item = Result<String, mrs_ai::AiError>> + Send {
    async_stream::stream! {
        let mut decoder = StreamingDecoder::json();
        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    let text = decoder.push(&chunk);
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
        let rest = decoder.finish();
        if !rest.is_empty() {
            yield Ok(rest);
        }
    }
}

/// POST /api/ai/completion/suggested-topics
pub async fn suggested_topics(
    State(state): State<AppState>,
    _auth: AuthUser,
    headers: HeaderMap,
    ApiJson(req): ApiJson<SuggestedTopicsRequest>,
) -> ApiResult<Response> {
    let website = company_website(req.website_url)?;
    let company = CompanyContext {
        name: req.name.unwrap_or_default(),
        website,
        country: req.country.unwrap_or_default(),
        language: req.language.unwrap_or_default(),
        sector: req.sector.unwrap_or_default(),
        description: req.description.unwrap_or_default(),
    };
    let request = prompts::suggested_topics_request(&company);
    let provider = &state.providers.openai;

    if wants_json(&headers) {
        let raw = provider.complete(&request).await?;
        let value: Value = parse_structured(&raw)?;
        let topics = parse_recommended_topics(&value)?;
        return Ok(Json(SuggestedTopics { topics }).into_response());
    }

    let stream = log_stream_errors(provider.name(), provider.stream(&request).await?);
    Ok(text_response(repaired_json(stream)))
}

/// POST /api/ai/completion/query
pub async fn generate_query(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(req): ApiJson<QueryRequest>,
) -> ApiResult<Json<AiGeneratedQuery>> {
    let (Some(company_name), Some(topic_name)) = (non_blank(req.company_name), non_blank(req.topic_name)) else {
        return Err(ApiError::BadRequest(
            "Company name and topic name are required".to_string(),
        ));
    };

    let ctx = SingleQueryContext {
        company_name,
        topic_name,
        topic_description: non_blank(req.topic_description),
        company_description: non_blank(req.company_description),
        existing: req.existing_queries.into_iter().map(ExistingQuery::from).collect(),
    };

    let raw = state
        .providers
        .openai
        .complete(&prompts::single_query_request(&ctx))
        .await?;
    let query: AiGeneratedQuery = parse_structured(&raw)?;
    if query.text.trim().is_empty() {
        return Err(ApiError::BadGateway("AI provider returned an empty query".to_string()));
    }
    Ok(Json(query))
}

pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ai/chat/chatgpt", post(chat_chatgpt))
        .route("/api/ai/chat/claude", post(chat_claude))
        .route("/api/ai/completion/company", post(company_profile))
        .route("/api/ai/completion/suggested-topics", post(suggested_topics))
        .route("/api/ai/completion/query", post(generate_query))
}
