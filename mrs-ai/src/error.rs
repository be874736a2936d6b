//! AI layer error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    /// Transport failure talking to a provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// No API key configured for the provider
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),

    /// Response arrived but did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Structured output failed to parse
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider reported an error mid-stream
    #[error("Stream error: {0}")]
    Stream(String),
}
