//! Shared guardrail identity types.
//!
//! The guardrail *function* (bytes -> metrics) lives in `acvps-guardrails`;
//! this crate only defines the identity/metadata types every other crate
//! needs to reference a guardrail without depending on its implementation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A guardrail reference as it appears inside a contract: the id, the
/// version, and the expected source-hash (tamper-evident identity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailSpec {
    pub id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub expected_source_hash: Option<String>,
}

/// Metadata describing a registered guardrail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailMetadata {
    pub id: String,
    pub version: String,
    pub source_hash: String,
    pub description: String,
    pub produced_metrics: Vec<String>,
}

/// Compute the tamper-evident source-hash of a guardrail: SHA-256 of the
/// normalized source (lowercased, comments stripped, whitespace collapsed).
pub fn source_hash(source: &str) -> String {
    let normalized = normalize_source(source);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_source(source: &str) -> String {
    source
        .lines()
        .map(|line| {
            let without_comment = match line.find("//") {
                Some(idx) => &line[..idx],
                None => line,
            };
            without_comment.to_lowercase()
        })
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_hash_ignores_comments_and_whitespace() {
        let a = "fn pii()  {\n  // detects pii\n  risk\n}";
        let b = "FN PII() {\nrisk\n}";
        assert_eq!(source_hash(a), source_hash(b));
    }

    #[test]
    fn source_hash_is_stable() {
        assert_eq!(source_hash("abc"), source_hash("abc"));
        assert_ne!(source_hash("abc"), source_hash("abd"));
    }
}
