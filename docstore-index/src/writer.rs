//! Mutable index construction.

use std::collections::BTreeMap;

use chrono::Utc;

use docstore_model::DocumentKind;

use crate::snapshot::{IndexEntry, IndexSnapshot};

/// In-memory index under construction by the indexer.
///
/// The writer owns its entries exclusively; `snapshot` freezes a copy, and
/// published snapshots are never mutated. An upsert replaces an
/// identifier's entry entirely, so replaying the same event is idempotent
/// and a later event for the same identifier wins.
#[derive(Debug)]
pub struct IndexWriter {
    kind: DocumentKind,
    entries: BTreeMap<String, IndexEntry>,
    last_offset: Option<u64>,
}

impl IndexWriter {
    /// Create an empty writer for `kind`.
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            last_offset: None,
        }
    }

    /// Rebuild a writer from a published snapshot, for indexer restart.
    pub fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        Self {
            kind: snapshot.kind,
            entries: snapshot.entries,
            last_offset: snapshot.built_from_offset,
        }
    }

    /// Kind this writer indexes.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the writer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest log offset applied so far.
    pub fn last_offset(&self) -> Option<u64> {
        self.last_offset
    }

    /// Replace the entry for `id` and record the offset it came from.
    pub fn upsert(&mut self, id: impl Into<String>, entry: IndexEntry, offset: u64) {
        self.entries.insert(id.into(), entry);
        self.record_offset(offset);
    }

    /// Record an offset consumed without an index effect (skipped document),
    /// so the next snapshot's resume point still covers it.
    pub fn record_offset(&mut self, offset: u64) {
        self.last_offset = Some(self.last_offset.map_or(offset, |last| last.max(offset)));
    }

    /// Freeze the current view into an immutable snapshot for `generation`.
    pub fn snapshot(&self, generation: u64) -> IndexSnapshot {
        IndexSnapshot {
            kind: self.kind,
            generation,
            built_from_offset: self.last_offset,
            built_at: Utc::now(),
            entries: self.entries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Field;

    fn entry(name: &str) -> IndexEntry {
        IndexEntry {
            digest: format!("sha256:{name}"),
            fields: vec![Field {
                name: "name".to_string(),
                value: name.to_string(),
            }],
        }
    }

    #[test]
    fn test_upsert_replaces_entry_entirely() {
        let mut writer = IndexWriter::new(DocumentKind::Sbom);
        writer.upsert("doc", entry("first"), 0);
        writer.upsert("doc", entry("second"), 1);

        assert_eq!(writer.len(), 1);
        let snapshot = writer.snapshot(1);
        let stored = &snapshot.entries["doc"];
        assert_eq!(stored.fields.len(), 1);
        assert_eq!(stored.fields[0].value, "second");
    }

    #[test]
    fn test_replaying_an_event_is_idempotent() {
        let mut writer = IndexWriter::new(DocumentKind::Sbom);
        writer.upsert("doc", entry("same"), 4);
        let first = writer.snapshot(1);
        writer.upsert("doc", entry("same"), 4);
        let second = writer.snapshot(1);

        assert_eq!(first.entries, second.entries);
        assert_eq!(first.built_from_offset, second.built_from_offset);
    }

    #[test]
    fn test_offsets_only_move_forward() {
        let mut writer = IndexWriter::new(DocumentKind::Vex);
        writer.record_offset(7);
        writer.record_offset(3);
        assert_eq!(writer.last_offset(), Some(7));
    }

    #[test]
    fn test_snapshot_roundtrip_restores_state() {
        let mut writer = IndexWriter::new(DocumentKind::Sbom);
        writer.upsert("a", entry("a"), 0);
        writer.upsert("b", entry("b"), 1);

        let snapshot = writer.snapshot(5);
        let restored = IndexWriter::from_snapshot(snapshot.clone());
        assert_eq!(restored.kind(), DocumentKind::Sbom);
        assert_eq!(restored.last_offset(), Some(1));
        assert_eq!(restored.snapshot(5).entries, snapshot.entries);
    }
}
