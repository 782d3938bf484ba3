//! VEX field extraction, for CSAF JSON documents.

use serde_json::Value;

use docstore_model::DocumentKind;

use crate::errors::ExtractionError;

use super::ExtractedDoc;

pub(super) fn extract(value: &Value) -> Result<ExtractedDoc, ExtractionError> {
    let document = value.get("document").and_then(Value::as_object).ok_or_else(|| {
        ExtractionError::unrecognized(
            DocumentKind::Vex,
            "expected a CSAF document with a `document` object",
        )
    })?;

    let mut doc = ExtractedDoc::default();

    if let Some(title) = document.get("title").and_then(Value::as_str) {
        doc.push("title", title);
    }
    if let Some(id) = document
        .get("tracking")
        .and_then(|tracking| tracking.get("id"))
        .and_then(Value::as_str)
    {
        doc.push("advisory", id);
    }
    if let Some(status) = document
        .get("tracking")
        .and_then(|tracking| tracking.get("status"))
        .and_then(Value::as_str)
    {
        doc.push("status", status);
    }
    if let Some(severity) = document
        .get("aggregate_severity")
        .and_then(|severity| severity.get("text"))
        .and_then(Value::as_str)
    {
        doc.push("severity", severity);
    }

    if let Some(vulnerabilities) = value.get("vulnerabilities").and_then(Value::as_array) {
        for vulnerability in vulnerabilities {
            if let Some(cve) = vulnerability.get("cve").and_then(Value::as_str) {
                doc.push("cve", cve);
            }
            if let Some(title) = vulnerability.get("title").and_then(Value::as_str) {
                doc.push("vulnerability_title", title);
            }
            if let Some(ids) = vulnerability.get("ids").and_then(Value::as_array) {
                for id in ids {
                    if let Some(text) = id.get("text").and_then(Value::as_str) {
                        doc.push("vulnerability_id", text);
                    }
                }
            }
            for (status, field) in [("known_affected", "affected"), ("fixed", "fixed")] {
                if let Some(products) = vulnerability
                    .pointer(&format!("/product_status/{status}"))
                    .and_then(Value::as_array)
                {
                    for product in products {
                        if let Some(product) = product.as_str() {
                            doc.push(field, product);
                        }
                    }
                }
            }
        }
    }

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::super::extract as extract_any;
    use crate::errors::ExtractionError;
    use docstore_model::DocumentKind;

    const CSAF: &[u8] = br#"{
        "document": {
            "category": "csaf_vex",
            "title": "Critical flaw in log4j",
            "tracking": {"id": "RHSA-2021:5138", "status": "final"},
            "aggregate_severity": {"text": "critical"}
        },
        "vulnerabilities": [
            {
                "cve": "CVE-2021-44228",
                "title": "Remote code execution in JNDI lookups",
                "ids": [{"system_name": "GHSA", "text": "GHSA-jfh8-c2jp-5v3q"}],
                "product_status": {
                    "known_affected": ["log4j-core-2.14"],
                    "fixed": ["log4j-core-2.17"]
                }
            }
        ]
    }"#;

    #[test]
    fn test_csaf_fields() {
        let doc = extract_any(DocumentKind::Vex, CSAF).unwrap();
        assert_eq!(doc.first("title"), Some("Critical flaw in log4j"));
        assert_eq!(doc.first("advisory"), Some("RHSA-2021:5138"));
        assert_eq!(doc.first("severity"), Some("critical"));
        assert_eq!(doc.first("cve"), Some("CVE-2021-44228"));
        assert_eq!(doc.first("vulnerability_id"), Some("GHSA-jfh8-c2jp-5v3q"));
        assert_eq!(doc.first("affected"), Some("log4j-core-2.14"));
        assert_eq!(doc.first("fixed"), Some("log4j-core-2.17"));
    }

    #[test]
    fn test_rejects_document_without_csaf_root() {
        let err = extract_any(DocumentKind::Vex, br#"{"bomFormat": "CycloneDX"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::UnrecognizedFormat { .. }));
    }
}
