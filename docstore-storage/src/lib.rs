//! # Docstore Storage
//!
//! Storage clients shared by the gateway, the indexer and the query
//! service: the durable content store holding document payloads, and the
//! index snapshot store holding versioned, immutable index snapshots.
//!
//! Both are thin wrappers over an [`object_store::ObjectStore`] backend, so
//! the same code runs against S3-compatible storage in production and an
//! in-memory or local-filesystem store in tests and devmode.

pub mod digest;
pub mod document;
pub mod errors;
pub mod retry;
pub mod snapshot;

pub use digest::ContentDigest;
pub use document::DocumentStore;
pub use errors::StorageError;
pub use retry::RetryPolicy;
pub use snapshot::{SnapshotPointer, SnapshotStore};
