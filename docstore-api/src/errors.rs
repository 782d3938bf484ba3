//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use docstore_index::ExtractionError;
use docstore_storage::StorageError;

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The payload is malformed for the declared kind.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The canonical payload exceeds the configured maximum.
    #[error("Payload exceeds maximum size of {0} bytes")]
    PayloadTooLarge(u64),

    /// The URL names a resource other than `sbom` or `vex`.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// No document stored under the requested identifier.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A required query parameter is missing or empty.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// The identity collaborator rejected the bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The storage backend failed after retries.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The request body could not be read.
    #[error("Request body error: {0}")]
    Body(String),
}

impl ApiError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => Self::NotFound(path),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// JSON body returned with every error status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable error tag.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            ApiError::UnknownResource(_) => (StatusCode::NOT_FOUND, "unknown_resource"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::MissingParameter(_) => (StatusCode::BAD_REQUEST, "missing_parameter"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Storage(_) => (StatusCode::BAD_GATEWAY, "storage"),
            ApiError::Body(_) => (StatusCode::BAD_REQUEST, "body"),
        };
        let body = ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
