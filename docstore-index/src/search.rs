//! Immutable search over a loaded snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use docstore_model::{DocumentKind, DocumentSummary, SearchQuery, SearchResponse};

use crate::extract::SEARCH_FIELDS;
use crate::snapshot::{IndexEntry, IndexSnapshot};
use crate::tokenizer::tokenize;

/// Fields copied into a hit's summary for display.
const SUMMARY_FIELDS: &[&str] = &["name", "version", "title", "advisory", "severity", "cve"];

/// Read-only search index built from one snapshot generation.
///
/// Construction tokenizes every field once; a search touches only immutable
/// maps, so a handle can be shared freely across concurrent requests while
/// a newer generation is swapped in behind it.
pub struct SearchIndex {
    kind: DocumentKind,
    postings: HashMap<String, BTreeSet<String>>,
    exact: HashMap<(String, String), BTreeSet<String>>,
    summaries: BTreeMap<String, DocumentSummary>,
}

/// One parsed query term. All terms of a query must match (AND).
enum Term {
    /// Free-text token, matched against every field's tokens.
    Token(String),
    /// `field:value` exact match, case-insensitive on the value.
    Field { name: String, value: String },
}

impl SearchIndex {
    /// Build the search structures from a snapshot.
    pub fn build(snapshot: &IndexSnapshot) -> Self {
        let mut index = Self::empty(snapshot.kind);
        for (id, entry) in &snapshot.entries {
            for field in &entry.fields {
                for token in tokenize(&field.value) {
                    index.postings.entry(token).or_default().insert(id.clone());
                }
                index
                    .exact
                    .entry((field.name.clone(), field.value.to_lowercase()))
                    .or_default()
                    .insert(id.clone());
            }
            index.summaries.insert(id.clone(), summarize(id, entry));
        }
        index
    }

    /// An index with no entries, used before the first generation loads.
    pub fn empty(kind: DocumentKind) -> Self {
        Self {
            kind,
            postings: HashMap::new(),
            exact: HashMap::new(),
            summaries: BTreeMap::new(),
        }
    }

    /// Kind this index serves.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Execute a query: intersect the candidate sets of all terms and page
    /// through the matches in identifier order. The response's `generation`
    /// is left unset; the caller serving the request fills it in.
    pub fn search(&self, query: &SearchQuery) -> SearchResponse {
        let terms = parse_terms(&query.q);
        if terms.is_empty() {
            return SearchResponse::empty();
        }

        let mut matched: Option<BTreeSet<&str>> = None;
        for term in &terms {
            let ids = self.ids_for(term);
            matched = Some(match matched.take() {
                Some(acc) => acc.intersection(&ids).copied().collect(),
                None => ids,
            });
            if matched.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }

        let matched = matched.unwrap_or_default();
        let hits = matched
            .iter()
            .skip(query.offset)
            .take(query.limit)
            .filter_map(|id| self.summaries.get(*id).cloned())
            .collect();

        SearchResponse {
            total: matched.len(),
            hits,
            generation: None,
        }
    }

    fn ids_for(&self, term: &Term) -> BTreeSet<&str> {
        let ids = match term {
            Term::Token(token) => self.postings.get(token),
            Term::Field { name, value } => self.exact.get(&(name.clone(), value.clone())),
        };
        ids.map(|ids| ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn summarize(id: &str, entry: &IndexEntry) -> DocumentSummary {
    let mut fields = BTreeMap::new();
    for name in SUMMARY_FIELDS {
        if let Some(field) = entry.fields.iter().find(|field| field.name == *name) {
            fields.insert(name.to_string(), field.value.clone());
        }
    }
    DocumentSummary {
        id: id.to_string(),
        digest: entry.digest.clone(),
        fields,
    }
}

fn parse_terms(q: &str) -> Vec<Term> {
    let mut terms = Vec::new();
    for raw in q.split_whitespace() {
        if let Some((name, value)) = raw.split_once(':') {
            let name = name.to_ascii_lowercase();
            // Only known field names form a field term; anything else
            // (e.g. a purl) falls through to tokenization.
            if !value.is_empty() && SEARCH_FIELDS.contains(&name.as_str()) {
                terms.push(Term::Field {
                    name,
                    value: value.trim_matches('"').to_lowercase(),
                });
                continue;
            }
        }
        for token in tokenize(raw) {
            terms.push(Term::Token(token));
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Field;
    use chrono::Utc;

    fn field(name: &str, value: &str) -> Field {
        Field {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn snapshot() -> IndexSnapshot {
        let mut entries = BTreeMap::new();
        entries.insert(
            "sbom-1".to_string(),
            IndexEntry {
                digest: "sha256:one".to_string(),
                fields: vec![
                    field("name", "web-shop"),
                    field("version", "3.1.0"),
                    field("component", "log4j-core"),
                    field("purl", "pkg:maven/org.apache.logging.log4j/log4j-core@2.14.0"),
                ],
            },
        );
        entries.insert(
            "sbom-2".to_string(),
            IndexEntry {
                digest: "sha256:two".to_string(),
                fields: vec![
                    field("name", "billing-service"),
                    field("component", "openssl"),
                ],
            },
        );
        IndexSnapshot {
            kind: DocumentKind::Sbom,
            generation: 1,
            built_from_offset: Some(1),
            built_at: Utc::now(),
            entries,
        }
    }

    #[test]
    fn test_free_text_token_matches() {
        let index = SearchIndex::build(&snapshot());
        let response = index.search(&SearchQuery::new("log4j"));
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].id, "sbom-1");
    }

    #[test]
    fn test_all_terms_must_match() {
        let index = SearchIndex::build(&snapshot());
        assert_eq!(index.search(&SearchQuery::new("log4j openssl")).total, 0);
        assert_eq!(index.search(&SearchQuery::new("web shop log4j")).total, 1);
    }

    #[test]
    fn test_field_term_matches_exact_value() {
        let index = SearchIndex::build(&snapshot());
        let response = index.search(&SearchQuery::new("name:web-shop"));
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].id, "sbom-1");

        // Value comparison is case-insensitive but exact.
        assert_eq!(index.search(&SearchQuery::new("name:WEB-SHOP")).total, 1);
        assert_eq!(index.search(&SearchQuery::new("name:web")).total, 0);
    }

    #[test]
    fn test_unknown_field_prefix_is_tokenized() {
        let index = SearchIndex::build(&snapshot());
        // `pkg` is not a field name, so the purl-looking term tokenizes and
        // matches via postings.
        let response = index.search(&SearchQuery::new(
            "pkg:maven/org.apache.logging.log4j/log4j-core@2.14.0",
        ));
        assert_eq!(response.total, 1);
    }

    #[test]
    fn test_empty_query_returns_no_hits() {
        let index = SearchIndex::build(&snapshot());
        assert_eq!(index.search(&SearchQuery::new("   ")).total, 0);
    }

    #[test]
    fn test_pagination() {
        let index = SearchIndex::build(&snapshot());
        // Both documents share no common token, use a field each owns.
        let all = index.search(&SearchQuery::new("service").with_limit(10));
        assert_eq!(all.total, 1);

        let paged = index.search(&SearchQuery::new("core").with_limit(1).with_offset(1));
        assert_eq!(paged.total, 1);
        assert!(paged.hits.is_empty());
    }

    #[test]
    fn test_summary_carries_display_fields() {
        let index = SearchIndex::build(&snapshot());
        let response = index.search(&SearchQuery::new("web-shop"));
        let hit = &response.hits[0];
        assert_eq!(hit.digest, "sha256:one");
        assert_eq!(hit.fields.get("name").map(String::as_str), Some("web-shop"));
        assert_eq!(hit.fields.get("version").map(String::as_str), Some("3.1.0"));
    }

    #[test]
    fn test_empty_index_matches_nothing() {
        let index = SearchIndex::empty(DocumentKind::Vex);
        assert!(index.is_empty());
        assert_eq!(index.search(&SearchQuery::new("anything")).total, 0);
    }
}
