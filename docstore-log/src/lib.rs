//! # Docstore Log
//!
//! The ingestion log contract: an append-only, per-partition ordered,
//! at-least-once event log decoupling the ingestion gateway from the
//! indexer. Partitions are keyed by [`DocumentKind`], so all events for one
//! kind are strictly ordered while independent consumer groups (the
//! indexer, external notification, ...) consume without affecting each
//! other.
//!
//! Two backends are provided: [`MemoryLog`] for tests and devmode, and a
//! Kafka backend behind the `kafka` feature for deployments with an
//! external broker.

pub mod errors;
#[cfg(feature = "kafka")]
pub mod kafka;
mod memory;

pub use errors::LogError;
pub use memory::MemoryLog;

use async_trait::async_trait;

use docstore_model::{DocumentKind, IngestionEvent, LogRecord};

/// Append side and subscription entry point of the ingestion log.
#[async_trait]
pub trait IngestionLog: Send + Sync {
    /// Append an event to the partition determined by `event.kind`,
    /// returning the offset the log assigned to it.
    async fn append(&self, event: IngestionEvent) -> Result<u64, LogError>;

    /// Create an independent consumer for `group` over the given
    /// partitions. A new consumer resumes after its group's last committed
    /// offset, or from the earliest retained offset when the group has
    /// never committed.
    async fn subscribe(
        &self,
        group: &str,
        kinds: &[DocumentKind],
    ) -> Result<Box<dyn LogConsumer>, LogError>;

    /// Earliest retained offset for a partition.
    async fn earliest_offset(&self, kind: DocumentKind) -> Result<u64, LogError>;

    /// Offset that the next appended event in a partition will receive.
    async fn next_offset(&self, kind: DocumentKind) -> Result<u64, LogError>;
}

/// A positioned consumer over one or more partitions.
///
/// Delivery is at-least-once: records may be redelivered after a crash or
/// an uncommitted restart, and consumers are expected to apply them
/// idempotently. `next` must be cancel-safe — a record counts as delivered
/// only once `next` has returned it.
#[async_trait]
pub trait LogConsumer: Send {
    /// Next record in partition order, suspending until one is available.
    async fn next(&mut self) -> Result<LogRecord, LogError>;

    /// Reposition a partition cursor to `offset`.
    async fn seek(&mut self, kind: DocumentKind, offset: u64) -> Result<(), LogError>;

    /// Record that all offsets up to and including `offset` have been
    /// processed by this consumer's group.
    async fn commit(&mut self, kind: DocumentKind, offset: u64) -> Result<(), LogError>;

    /// Last committed offset for this consumer's group, if any.
    async fn committed(&mut self, kind: DocumentKind) -> Result<Option<u64>, LogError>;
}
