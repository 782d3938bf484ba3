//! Field and query tokenization.

/// Split text into lowercase alphanumeric tokens.
///
/// Every non-alphanumeric character is a separator, so a purl like
/// `pkg:maven/org.apache.logging/log4j-core@2.14.0` yields `pkg`, `maven`,
/// `org`, `apache`, ... — which is what makes free-text terms match inside
/// structured identifiers.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
