//! Document metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kind::DocumentKind;

/// Metadata describing one stored document.
///
/// Returned to the producer after a successful ingest. The identifier is
/// externally assigned and unique per kind; re-ingesting the same identifier
/// overwrites the prior payload and digest (last-write-wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Externally assigned document identifier.
    pub id: String,
    /// Document kind.
    pub kind: DocumentKind,
    /// Content digest over the canonical (decompressed) bytes, `sha256:<hex>`.
    pub digest: String,
    /// Size of the canonical payload in bytes.
    pub size: u64,
    /// When the payload became durably stored.
    pub stored_at: DateTime<Utc>,
}
