//! SBOM field extraction, for CycloneDX and SPDX JSON documents.

use serde_json::Value;

use docstore_model::DocumentKind;

use crate::errors::ExtractionError;

use super::ExtractedDoc;

pub(super) fn extract(value: &Value) -> Result<ExtractedDoc, ExtractionError> {
    if value.get("bomFormat").and_then(Value::as_str) == Some("CycloneDX") {
        Ok(extract_cyclonedx(value))
    } else if value.get("spdxVersion").and_then(Value::as_str).is_some() {
        Ok(extract_spdx(value))
    } else {
        Err(ExtractionError::unrecognized(
            DocumentKind::Sbom,
            "expected a CycloneDX or SPDX JSON document",
        ))
    }
}

fn extract_cyclonedx(value: &Value) -> ExtractedDoc {
    let mut doc = ExtractedDoc::default();

    if let Some(component) = value.pointer("/metadata/component") {
        extract_component(component, &mut doc, true);
    }
    if let Some(timestamp) = value.pointer("/metadata/timestamp").and_then(Value::as_str) {
        doc.push("created", timestamp);
    }
    if let Some(components) = value.get("components").and_then(Value::as_array) {
        for component in components {
            extract_component(component, &mut doc, false);
        }
    }
    doc
}

// The described (primary) component maps to name/version, dependencies to
// component/component_version.
fn extract_component(component: &Value, doc: &mut ExtractedDoc, primary: bool) {
    if let Some(name) = component.get("name").and_then(Value::as_str) {
        doc.push(if primary { "name" } else { "component" }, name);
    }
    if let Some(version) = component.get("version").and_then(Value::as_str) {
        doc.push(if primary { "version" } else { "component_version" }, version);
    }
    if let Some(purl) = component.get("purl").and_then(Value::as_str) {
        doc.push("purl", purl);
    }
    if let Some(cpe) = component.get("cpe").and_then(Value::as_str) {
        doc.push("cpe", cpe);
    }
    if let Some(description) = component.get("description").and_then(Value::as_str) {
        doc.push("description", description);
    }
    if let Some(supplier) = component.pointer("/supplier/name").and_then(Value::as_str) {
        doc.push("supplier", supplier);
    }
    if let Some(licenses) = component.get("licenses").and_then(Value::as_array) {
        for entry in licenses {
            if let Some(id) = entry.pointer("/license/id").and_then(Value::as_str) {
                doc.push("license", id);
            } else if let Some(name) = entry.pointer("/license/name").and_then(Value::as_str) {
                doc.push("license", name);
            }
        }
    }
}

fn extract_spdx(value: &Value) -> ExtractedDoc {
    let mut doc = ExtractedDoc::default();

    if let Some(name) = value.get("name").and_then(Value::as_str) {
        doc.push("name", name);
    }
    if let Some(created) = value.pointer("/creationInfo/created").and_then(Value::as_str) {
        doc.push("created", created);
    }
    if let Some(packages) = value.get("packages").and_then(Value::as_array) {
        for package in packages {
            if let Some(name) = package.get("name").and_then(Value::as_str) {
                doc.push("component", name);
            }
            if let Some(version) = package.get("versionInfo").and_then(Value::as_str) {
                doc.push("component_version", version);
            }
            if let Some(license) = package.get("licenseConcluded").and_then(Value::as_str) {
                if license != "NOASSERTION" {
                    doc.push("license", license);
                }
            }
            if let Some(supplier) = package.get("supplier").and_then(Value::as_str) {
                doc.push("supplier", supplier);
            }
            if let Some(summary) = package.get("summary").and_then(Value::as_str) {
                doc.push("description", summary);
            }
            if let Some(refs) = package.get("externalRefs").and_then(Value::as_array) {
                for reference in refs {
                    let reference_type = reference.get("referenceType").and_then(Value::as_str);
                    let locator = reference.get("referenceLocator").and_then(Value::as_str);
                    match (reference_type, locator) {
                        (Some("purl"), Some(locator)) => doc.push("purl", locator),
                        (Some("cpe22Type"), Some(locator)) | (Some("cpe23Type"), Some(locator)) => {
                            doc.push("cpe", locator)
                        }
                        _ => {}
                    }
                }
            }
        }
    }
    doc
}
