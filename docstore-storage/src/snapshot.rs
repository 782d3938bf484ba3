//! Index snapshot store client.
//!
//! Snapshots are immutable blobs written under a generation-qualified key;
//! the per-kind latest-pointer key is updated only after the blob write has
//! returned (publish-then-point). A reader polling [`SnapshotStore::latest`]
//! therefore never observes a generation whose blob is not yet durable, and
//! a partially written snapshot is never visible as latest.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use docstore_model::DocumentKind;

use crate::errors::StorageError;

/// Key prefix under which snapshots and pointers are stored.
const INDEX_PREFIX: &str = "index";

/// File name of the per-kind latest-pointer object.
const LATEST_KEY: &str = "latest.json";

/// Extension of snapshot blob objects.
const BLOB_SUFFIX: &str = ".bin";

/// Pointer to the most recent complete snapshot generation for a kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPointer {
    /// Monotonically increasing generation number.
    pub generation: u64,
    /// Generation-qualified object key holding the serialized snapshot.
    pub location: String,
    /// Last log offset reflected in the snapshot, if any event was consumed.
    pub built_from_offset: Option<u64>,
    /// When the snapshot was published.
    pub built_at: DateTime<Utc>,
}

/// Client for the index snapshot store.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn ObjectStore>,
}

impl SnapshotStore {
    /// Create a client over the given backend.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn kind_prefix(kind: DocumentKind) -> Path {
        Path::from(format!("{INDEX_PREFIX}/{kind}"))
    }

    fn blob_key(kind: DocumentKind, generation: u64) -> Path {
        Path::from(format!("{INDEX_PREFIX}/{kind}/{generation:020}{BLOB_SUFFIX}"))
    }

    fn pointer_key(kind: DocumentKind) -> Path {
        Path::from(format!("{INDEX_PREFIX}/{kind}/{LATEST_KEY}"))
    }

    /// Publish a snapshot blob under `generation` and move the latest
    /// pointer to it. The pointer write happens strictly after the blob
    /// write returns.
    #[instrument(skip(self, blob), fields(kind = %kind, generation = generation, size = blob.len()))]
    pub async fn publish(
        &self,
        kind: DocumentKind,
        generation: u64,
        built_from_offset: Option<u64>,
        blob: Bytes,
    ) -> Result<SnapshotPointer, StorageError> {
        let location = Self::blob_key(kind, generation);
        self.store.put(&location, PutPayload::from(blob)).await?;

        let pointer = SnapshotPointer {
            generation,
            location: location.to_string(),
            built_from_offset,
            built_at: Utc::now(),
        };
        let encoded = serde_json::to_vec(&pointer)?;
        self.store
            .put(&Self::pointer_key(kind), PutPayload::from(encoded))
            .await?;

        info!(built_from_offset = ?built_from_offset, "Published index snapshot");
        Ok(pointer)
    }

    /// Latest complete generation for `kind`, or `None` before the first
    /// publish.
    pub async fn latest(&self, kind: DocumentKind) -> Result<Option<SnapshotPointer>, StorageError> {
        match self.store.get(&Self::pointer_key(kind)).await {
            Ok(result) => {
                let data = result.bytes().await?;
                Ok(Some(serde_json::from_slice(&data)?))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch a snapshot blob by pointer.
    pub async fn fetch(&self, pointer: &SnapshotPointer) -> Result<Bytes, StorageError> {
        let result = self.store.get(&Path::from(pointer.location.as_str())).await?;
        Ok(result.bytes().await?)
    }

    /// Delete snapshot blobs older than the `keep` most recent generations.
    /// Returns the number of blobs removed. The latest pointer is never
    /// touched, so a query service holding an older pointer can still fall
    /// back to `latest` after a miss.
    pub async fn prune(&self, kind: DocumentKind, keep: usize) -> Result<usize, StorageError> {
        let prefix = Self::kind_prefix(kind);
        let mut generations: Vec<(u64, Path)> = Vec::new();

        let mut listing = self.store.list(Some(&prefix));
        while let Some(meta) = listing.try_next().await? {
            let Some(name) = meta.location.filename() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(BLOB_SUFFIX) else {
                continue;
            };
            if let Ok(generation) = stem.parse::<u64>() {
                generations.push((generation, meta.location.clone()));
            }
        }

        generations.sort_by(|a, b| b.0.cmp(&a.0));
        let mut removed = 0;
        for (generation, location) in generations.into_iter().skip(keep) {
            self.store.delete(&location).await?;
            debug!(kind = %kind, generation = generation, "Pruned superseded snapshot");
            removed += 1;
        }
        Ok(removed)
    }
}
