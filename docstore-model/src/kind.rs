//! Document kinds handled by the services.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two document families the services store and index.
///
/// The kind determines the content-store key prefix, the ingestion log
/// partition, and the field extractor applied during indexing. All events
/// for one kind flow through one partition, so they are strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Software bill of materials.
    Sbom,
    /// Vulnerability exploitability exchange statement.
    Vex,
}

impl DocumentKind {
    /// All kinds, in partition order.
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Sbom, DocumentKind::Vex];

    /// Canonical lowercase name used in URLs, storage keys and partition names.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Sbom => "sbom",
            DocumentKind::Vex => "vex",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown document kind name.
#[derive(Debug, thiserror::Error)]
#[error("unknown document kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for DocumentKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sbom" => Ok(DocumentKind::Sbom),
            "vex" => Ok(DocumentKind::Vex),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_kinds() {
        assert_eq!("sbom".parse::<DocumentKind>().unwrap(), DocumentKind::Sbom);
        assert_eq!("vex".parse::<DocumentKind>().unwrap(), DocumentKind::Vex);
        assert!("cve".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for kind in DocumentKind::ALL {
            assert_eq!(kind.to_string().parse::<DocumentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&DocumentKind::Sbom).unwrap(), "\"sbom\"");
        let kind: DocumentKind = serde_json::from_str("\"vex\"").unwrap();
        assert_eq!(kind, DocumentKind::Vex);
    }
}
