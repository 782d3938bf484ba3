//! # Docstore Indexer
//!
//! The indexing side of the pipeline: consumes ingestion events from the
//! log, fetches payloads from the content store, extracts searchable
//! fields, and periodically publishes immutable index snapshots to the
//! snapshot store. One indexer task owns one partition (document kind), so
//! generation numbering has a single writer.

pub mod errors;
mod indexer;

pub use errors::IndexerError;
pub use indexer::{Indexer, IndexerConfig, IndexerState, SkippedEntry};
