//! Search request and response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default number of hits returned when the caller does not specify one.
pub const DEFAULT_SEARCH_LIMIT: usize = 25;

/// Parameters for an indexed search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text query. Whitespace-separated terms are all required;
    /// a `field:value` term matches that field's exact value.
    pub q: String,
    /// Maximum number of hits to return.
    pub limit: usize,
    /// Number of matching documents to skip, for pagination.
    pub offset: usize,
}

impl SearchQuery {
    /// Create a query with default pagination.
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
        }
    }

    /// Set the maximum number of hits.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the pagination offset.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// A single search hit: the document identifier plus representative
/// extracted fields for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Document identifier, usable for a direct lookup.
    pub id: String,
    /// Digest of the payload the indexed fields were extracted from.
    pub digest: String,
    /// Representative extracted fields (name, version, title, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

/// Response for a search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Total number of matching documents, before pagination.
    pub total: usize,
    /// The requested page of hits, in stable identifier order.
    pub hits: Vec<DocumentSummary>,
    /// Index generation the search was served from, if one is loaded.
    pub generation: Option<u64>,
}

impl SearchResponse {
    /// An empty response.
    pub fn empty() -> Self {
        Self {
            total: 0,
            hits: Vec::new(),
            generation: None,
        }
    }
}
