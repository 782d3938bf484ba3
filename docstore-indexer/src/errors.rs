//! Indexer error types.

use thiserror::Error;

use docstore_index::IndexError;
use docstore_log::LogError;
use docstore_storage::StorageError;

/// Errors that can occur while starting or running the indexer.
///
/// Per-document failures (payload fetch, extraction) are not errors at
/// this level — they become skipped entries and consumption proceeds.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Storage error while resuming or publishing.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Ingestion log error.
    #[error("Log error: {0}")]
    Log(#[from] LogError),

    /// Snapshot encoding or decoding error.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}
