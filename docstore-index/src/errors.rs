//! Index error types.

use thiserror::Error;

use docstore_model::DocumentKind;

/// Errors raised while extracting searchable fields from a payload.
///
/// Always scoped to a single document: an extraction failure is surfaced
/// to the gateway as a validation rejection, and recorded as a skipped
/// entry by the indexer, never propagated as a stream failure.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The payload is not valid JSON at all.
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(String),

    /// The payload parses as JSON but not as the declared kind's format.
    #[error("Payload does not match the {kind} document format: {reason}")]
    UnrecognizedFormat { kind: DocumentKind, reason: String },
}

impl ExtractionError {
    /// Create an invalid-JSON error.
    pub fn invalid_json(msg: impl Into<String>) -> Self {
        Self::InvalidJson(msg.into())
    }

    /// Create an unrecognized-format error.
    pub fn unrecognized(kind: DocumentKind, reason: impl Into<String>) -> Self {
        Self::UnrecognizedFormat {
            kind,
            reason: reason.into(),
        }
    }
}

/// Errors raised while encoding or decoding index snapshots.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A snapshot could not be serialized.
    #[error("Snapshot encoding error: {0}")]
    Encode(String),

    /// A snapshot blob could not be deserialized.
    #[error("Snapshot decoding error: {0}")]
    Decode(String),
}

impl IndexError {
    /// Create an encoding error.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a decoding error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
