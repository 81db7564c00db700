//! Error types for capif-daemon

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use capif_types::{CapifError, Collaborator, DenyReason};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Authorization denied
    #[error("Access denied: {0}")]
    Forbidden(DenyReason),

    /// External collaborator unreachable
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: Collaborator,
        message: String,
    },
}

impl From<CapifError> for ApiError {
    fn from(err: CapifError) -> Self {
        match err {
            CapifError::Validation(message) => ApiError::BadRequest(message),
            CapifError::NotFound(message) => ApiError::NotFound(message),
            CapifError::Conflict(message) => ApiError::Conflict(message),
            CapifError::Auth(reason) => ApiError::Forbidden(reason),
            CapifError::Dependency(dep) => ApiError::Unavailable {
                collaborator: dep.collaborator,
                message: dep.message,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", None),
            ApiError::Forbidden(reason) => (
                StatusCode::FORBIDDEN,
                "ACCESS_DENIED",
                Some(json!({ "reason": reason })),
            ),
            ApiError::Unavailable { collaborator, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DEPENDENCY_UNAVAILABLE",
                Some(json!({ "collaborator": collaborator })),
            ),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
