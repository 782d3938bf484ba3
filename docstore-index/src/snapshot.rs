//! Serialized index snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docstore_model::DocumentKind;

use crate::errors::IndexError;
use crate::extract::Field;

/// A document's entry inside a snapshot: the digest of the payload the
/// fields were extracted from, plus the fields themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Digest of the indexed payload.
    pub digest: String,
    /// Extracted searchable fields.
    pub fields: Vec<Field>,
}

/// An immutable, versioned snapshot of the index for one kind.
///
/// Exactly one snapshot exists per generation; generations are assigned by
/// the single indexer writer for the partition and never reused. The at-rest
/// format carries only the entries — token postings are rebuilt when the
/// query service loads the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Document kind this snapshot indexes.
    pub kind: DocumentKind,
    /// Monotonically increasing generation number.
    pub generation: u64,
    /// Last log offset reflected in the snapshot, if any event was consumed.
    pub built_from_offset: Option<u64>,
    /// When the snapshot was frozen.
    pub built_at: DateTime<Utc>,
    /// Index entries keyed by document identifier.
    pub entries: BTreeMap<String, IndexEntry>,
}

impl IndexSnapshot {
    /// Serialize for publication to the snapshot store.
    pub fn encode(&self) -> Result<Vec<u8>, IndexError> {
        bincode::serialize(self).map_err(|e| IndexError::encode(e.to_string()))
    }

    /// Deserialize a snapshot blob fetched from the snapshot store.
    pub fn decode(data: &[u8]) -> Result<Self, IndexError> {
        bincode::deserialize(data).map_err(|e| IndexError::decode(e.to_string()))
    }
}
