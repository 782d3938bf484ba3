//! Storage error types.

use thiserror::Error;

/// Errors that can occur during content or snapshot store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The storage backend failed; typically transient and retryable.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Whether this error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Self::NotFound(path),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
