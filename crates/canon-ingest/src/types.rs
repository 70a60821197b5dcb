//! Value types flowing through the multi-source pipeline.
//!
//! None of these are persisted directly. A [`ConflictOutcome`] is turned into
//! an [`IngestionRequest`](canon_core::IngestionRequest) by the orchestrator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};

use canon_core::SourceDocumentInput;

/// Unprocessed content from one upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSourceInput {
    pub source_type: String,
    pub source_uri: String,
    pub content: String,
    /// Hex SHA-256 of `content` when left blank by the caller.
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

impl RawSourceInput {
    /// Build a source whose hash is derived from its content.
    pub fn new(
        source_type: impl Into<String>,
        source_uri: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            source_type: source_type.into(),
            source_uri: source_uri.into(),
            content_hash: content_sha256(&content),
            content,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Fill a blank `content_hash` from the content.
    pub fn ensure_content_hash(&mut self) {
        if self.content_hash.trim().is_empty() {
            self.content_hash = content_sha256(&self.content);
        }
    }
}

/// Hex-encoded SHA-256 of a source body.
pub fn content_sha256(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// A source after normalization: a document fragment plus its scores.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSource {
    /// Persistence-shaped source. `weight` is a placeholder until weighting.
    pub source_input: SourceDocumentInput,
    pub title: String,
    /// Small XML document with a `<header>` the header parser can read.
    pub fragment: String,
    pub quality_score: f64,
    pub freshness_score: f64,
    pub reliability_score: f64,
}

/// A normalized source with its computed weight and the factors behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightingResult {
    pub source: NormalizedSource,
    /// Always within `[0, 1]`.
    pub computed_weight: f64,
    pub factors: BTreeMap<String, f64>,
}

/// The result of arbitrating between weighted sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictOutcome {
    pub content: String,
    pub title: String,
    /// Never empty.
    pub preferred_sources: Vec<WeightingResult>,
    pub rejected_sources: Vec<WeightingResult>,
    pub resolution_notes: String,
}

/// Input to multi-source ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSourceRequest {
    pub raw_sources: Vec<RawSourceInput>,
    pub series_slug: String,
    #[serde(default)]
    pub requested_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_hashes_content() {
        let raw = RawSourceInput::new("transcript", "s3://bucket/ep1.txt", "hello");
        assert_eq!(
            raw.content_hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_ensure_content_hash_keeps_explicit_hash() {
        let mut raw = RawSourceInput::new("rss", "https://feed", "body");
        raw.content_hash = "abc".into();
        raw.ensure_content_hash();
        assert_eq!(raw.content_hash, "abc");

        raw.content_hash = "  ".into();
        raw.ensure_content_hash();
        assert_eq!(raw.content_hash, content_sha256("body"));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: MultiSourceRequest = serde_json::from_value(json!({
            "series_slug": "morning-brief",
            "raw_sources": [
                {"source_type": "brief", "source_uri": "file:///b.md", "content": "Line"}
            ]
        }))
        .unwrap();

        assert!(request.requested_by.is_none());
        assert_eq!(request.raw_sources[0].content_hash, "");
        assert!(request.raw_sources[0].metadata.is_empty());
    }
}
