//! Durable content store client.

use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, instrument};

use docstore_model::DocumentKind;

use crate::errors::StorageError;

/// Key prefix under which document payloads are stored.
const DOCUMENT_PREFIX: &str = "documents";

/// Client for the durable content store.
///
/// Payloads are addressed by `(kind, id)` and written in a single atomic
/// put, so a reader observes either the previous payload or the new one,
/// never a partial write. Reads are strongly consistent for a given key:
/// a successful `put` is immediately visible to `get`, independent of any
/// indexing activity.
#[derive(Clone)]
pub struct DocumentStore {
    store: Arc<dyn ObjectStore>,
}

impl DocumentStore {
    /// Create a client over the given backend.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn key(kind: DocumentKind, id: &str) -> Path {
        Path::from(format!("{DOCUMENT_PREFIX}/{kind}/{id}"))
    }

    /// Store canonical payload bytes under `(kind, id)`, overwriting any
    /// prior value.
    #[instrument(skip(self, payload), fields(kind = %kind, id = id, size = payload.len()))]
    pub async fn put(&self, kind: DocumentKind, id: &str, payload: Bytes) -> Result<(), StorageError> {
        self.store
            .put(&Self::key(kind, id), PutPayload::from(payload))
            .await?;
        debug!("Stored document payload");
        Ok(())
    }

    /// Fetch the canonical payload for `(kind, id)`.
    pub async fn get(&self, kind: DocumentKind, id: &str) -> Result<Bytes, StorageError> {
        let result = self.store.get(&Self::key(kind, id)).await?;
        Ok(result.bytes().await?)
    }
}
