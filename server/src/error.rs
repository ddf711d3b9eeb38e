use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error type shared by all HTTP handlers.
///
/// Delivery misses on the real-time channel are deliberately NOT part of
/// this taxonomy — an offline recipient is expected steady-state behavior
/// and never surfaces as a failure once persistence has succeeded.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or empty request content (e.g. message with no body and
    /// no attachments). Maps to 400.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials. Maps to 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Referenced user/conversation absent. Maps to 404.
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate resource (username taken, request already sent). Maps to 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The durable store failed. Maps to 500; detail is logged, never
    /// sent to the client.
    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Anything else that should not leak detail to the client. Maps to 500.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Store(err) => {
                tracing::error!(error = %err, "storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
