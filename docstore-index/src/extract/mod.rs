//! Per-kind field extraction.
//!
//! Dispatch is a closed match over [`DocumentKind`]; each kind has its own
//! extractor module. The extractors also serve as the gateway's format
//! validation, so every stored document is one the indexer can handle.
//! Field *semantics* beyond the extracted names are out of scope.

mod sbom;
mod vex;

use serde_json::Value;

use docstore_model::DocumentKind;

use crate::errors::ExtractionError;

/// Field names the extractors can produce. A `field:value` query term is
/// recognized only for these names.
pub const SEARCH_FIELDS: &[&str] = &[
    "name",
    "version",
    "component",
    "component_version",
    "purl",
    "cpe",
    "description",
    "supplier",
    "license",
    "created",
    "title",
    "advisory",
    "severity",
    "status",
    "cve",
    "vulnerability_id",
    "vulnerability_title",
    "affected",
    "fixed",
];

/// One extracted searchable field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Field {
    /// Field name, one of [`SEARCH_FIELDS`].
    pub name: String,
    /// Extracted value, verbatim from the document.
    pub value: String,
}

/// The searchable fields extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExtractedDoc {
    /// Extracted fields, in document order. A field name may repeat.
    pub fields: Vec<Field>,
}

impl ExtractedDoc {
    /// Add a field, dropping blank values.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.fields.push(Field {
                name: name.to_string(),
                value,
            });
        }
    }

    /// First value for a field name, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

/// Extract the searchable fields for `kind` from canonical payload bytes.
pub fn extract(kind: DocumentKind, payload: &[u8]) -> Result<ExtractedDoc, ExtractionError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| ExtractionError::invalid_json(e.to_string()))?;
    match kind {
        DocumentKind::Sbom => sbom::extract(&value),
        DocumentKind::Vex => vex::extract(&value),
    }
}

/// Check that a payload parses as the declared kind's document format.
pub fn validate(kind: DocumentKind, payload: &[u8]) -> Result<(), ExtractionError> {
    extract(kind, payload).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_json() {
        let err = extract(DocumentKind::Sbom, b"not json").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidJson(_)));
    }

    #[test]
    fn test_rejects_wrong_format_for_kind() {
        // Valid JSON, but neither CycloneDX nor SPDX.
        let err = validate(DocumentKind::Sbom, br#"{"hello": "world"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::UnrecognizedFormat { .. }));

        // A CSAF document is not an SBOM.
        let err = validate(DocumentKind::Sbom, br#"{"document": {"title": "x"}}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::UnrecognizedFormat { .. }));
    }

    #[test]
    fn test_push_drops_blank_values() {
        let mut doc = ExtractedDoc::default();
        doc.push("name", "  ");
        doc.push("name", "present");
        assert_eq!(doc.fields.len(), 1);
        assert_eq!(doc.first("name"), Some("present"));
    }
}
