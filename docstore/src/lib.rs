//! # Docstore
//!
//! Entry-point crate wiring the ingestion gateway, the query service and
//! the per-kind indexers into one runnable process, configured from the
//! environment.

pub mod config;

pub use config::Dependencies;

use thiserror::Error;

/// Errors that can occur during service initialization or execution.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    StorageError(#[from] docstore_storage::StorageError),

    /// Ingestion log error.
    #[error("Log error: {0}")]
    LogError(#[from] docstore_log::LogError),

    /// Indexer error.
    #[error("Indexer error: {0}")]
    IndexerError(#[from] docstore_indexer::IndexerError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ServiceError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
