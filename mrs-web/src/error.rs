//! Error types for mrs-web
//!
//! Every handler failure becomes the `{"success": false, "error": "..."}`
//! envelope with a matching status code. Internal details (database errors,
//! provider responses) are logged and replaced by a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mrs_ai::AiError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::webhook::WebhookError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Validation failure (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No valid session (401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but not a member of the target project (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409), e.g. slug or email already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Upstream service failed (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Required integration not configured (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// mrs-common error
    #[error("Common error: {0}")]
    Common(#[from] mrs_common::Error),

    /// AI provider error
    #[error("AI error: {0}")]
    Ai(#[from] AiError),
}

impl ApiError {
    /// The session-less / membership-less rejection used by most handlers
    pub fn unauthorized() -> Self {
        ApiError::Unauthenticated("Unauthorized".to_string())
    }

    pub fn forbidden() -> Self {
        ApiError::Forbidden("Unauthorized".to_string())
    }

    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Common(err) => match err {
                mrs_common::Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                mrs_common::Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
                mrs_common::Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
                other => {
                    error!("Request failed: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
            ApiError::Ai(err) => match err {
                AiError::MissingApiKey(provider) => {
                    warn!("{} API key not configured", provider);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        format!("{} is not configured", provider),
                    )
                }
                other => {
                    error!("AI provider request failed: {}", other);
                    (StatusCode::BAD_GATEWAY, "AI provider request failed".to_string())
                }
            },
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::NotConfigured => ApiError::Unavailable(err.to_string()),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Success half of the response envelope
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    pub data: T,
}

/// Wrap handler output in `{"success": true, "data": ...}`
pub fn ok<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        data,
    })
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
