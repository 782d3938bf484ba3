//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use docstore_log::IngestionLog;
use docstore_storage::{DocumentStore, RetryPolicy, SnapshotStore};

use crate::auth::Authenticator;
use crate::refresh::SearchHandles;

/// Limits and intervals for the HTTP layer.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Maximum canonical (decompressed) payload size accepted by the
    /// gateway, in bytes.
    pub max_payload_bytes: u64,
    /// Bounded retries for the content-store write and the post-store log
    /// append.
    pub retry: RetryPolicy,
    /// Poll interval of the snapshot refresh task.
    pub refresh_interval: Duration,
    /// Upper bound on the `limit` search parameter.
    pub max_search_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 64 * 1024 * 1024,
            retry: RetryPolicy::default(),
            refresh_interval: Duration::from_secs(5),
            max_search_limit: 100,
        }
    }
}

/// State shared across all handlers and the refresh task.
pub struct AppState {
    /// Durable content store, the source of truth for lookups.
    pub documents: DocumentStore,
    /// Snapshot store polled by the refresh task.
    pub snapshots: SnapshotStore,
    /// Ingestion log the gateway appends to.
    pub log: Arc<dyn IngestionLog>,
    /// Per-kind atomically swapped search indexes.
    pub search: SearchHandles,
    /// Identity collaborator verdict provider.
    pub authenticator: Arc<dyn Authenticator>,
    /// Limits and intervals.
    pub config: ApiConfig,
}

impl AppState {
    /// Assemble the state with empty search handles; the refresh task
    /// fills them in as generations are published.
    pub fn new(
        documents: DocumentStore,
        snapshots: SnapshotStore,
        log: Arc<dyn IngestionLog>,
        authenticator: Arc<dyn Authenticator>,
        config: ApiConfig,
    ) -> Self {
        Self {
            documents,
            snapshots,
            log,
            search: SearchHandles::new(),
            authenticator,
            config,
        }
    }
}
