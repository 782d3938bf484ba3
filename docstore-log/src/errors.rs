//! Log error types.

use thiserror::Error;

use docstore_model::DocumentKind;

/// Errors that can occur in the ingestion log.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log backend failed; typically transient and retryable.
    #[error("Log backend error: {0}")]
    Backend(String),

    /// An event payload could not be encoded or decoded.
    #[error("Event encoding error: {0}")]
    Encoding(String),

    /// The consumer is not subscribed to the requested partition.
    #[error("Consumer is not subscribed to partition {0}")]
    NotSubscribed(DocumentKind),
}

impl LogError {
    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create an encoding error.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }
}
