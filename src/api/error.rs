use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coach_store::{EmbedError, KnowledgeError};
use serde::Serialize;

use crate::engine::EngineError;
use crate::profile::ProfileError;

/// API-layer error type
#[derive(Debug)]
pub enum ApiError {
    /// 400 - Bad request (invalid input)
    BadRequest(String),

    /// 404 - Unknown resource
    NotFound(String),

    /// 500 - Internal error
    Internal(String),

    /// 502 - Upstream model failed
    BadGateway(String),

    /// 503 - Service unavailable (e.g., embedding model not loaded)
    Unavailable(String),

    /// 504 - Upstream model timed out
    GatewayTimeout(String),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "generation_failed", msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
            ApiError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "generation_timeout", msg)
            }
        };

        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        }

        let body = ErrorBody {
            error: error_type.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

// Convert knowledge store errors
impl From<KnowledgeError> for ApiError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Embedding(EmbedError::Unavailable(e)) => {
                ApiError::Unavailable(format!("Embedding provider unavailable: {e}"))
            }
            KnowledgeError::CorpusMissing(path) => ApiError::Unavailable(format!(
                "Knowledge corpus not found at {}",
                path.display()
            )),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// Convert engine errors to API errors
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Knowledge(e) => e.into(),
            EngineError::Generation(e) => ApiError::BadGateway(format!("LLM error: {e}")),
            EngineError::Timeout(after) => {
                ApiError::GatewayTimeout(format!("LLM did not answer within {after:?}"))
            }
            EngineError::Worker(e) => ApiError::Internal(e),
        }
    }
}

// Convert profile errors
impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::InvalidUserId(_) | ProfileError::Validation(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
