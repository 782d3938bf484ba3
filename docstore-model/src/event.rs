//! Ingestion log events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::DocumentMetadata;
use crate::kind::DocumentKind;

/// Event appended to the ingestion log once a document is durably stored.
///
/// Immutable once appended. The event carries a reference (kind and id),
/// not the payload; consumers fetch the payload from the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionEvent {
    /// Document identifier.
    pub id: String,
    /// Document kind, which also selects the log partition.
    pub kind: DocumentKind,
    /// Digest of the stored canonical bytes at the time of ingestion.
    pub digest: String,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl IngestionEvent {
    /// Create the event for a freshly stored document.
    pub fn new(metadata: &DocumentMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            kind: metadata.kind,
            digest: metadata.digest.clone(),
            timestamp: metadata.stored_at,
        }
    }
}

/// A delivered log record: the event plus the per-partition offset the log
/// assigned to it at append time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Monotonic offset within the partition for `event.kind`.
    pub offset: u64,
    /// The delivered event.
    pub event: IngestionEvent,
}
