//! # Docstore Index
//!
//! Everything between a stored payload and a search hit: per-kind field
//! extraction (also used by the gateway as format validation), the mutable
//! index the indexer builds, the serialized snapshot format it publishes,
//! and the immutable search index the query service loads.

pub mod errors;
pub mod extract;
pub mod search;
pub mod snapshot;
pub mod tokenizer;
pub mod writer;

pub use errors::{ExtractionError, IndexError};
pub use extract::{extract, validate, ExtractedDoc, Field};
pub use search::SearchIndex;
pub use snapshot::{IndexEntry, IndexSnapshot};
pub use writer::IndexWriter;
