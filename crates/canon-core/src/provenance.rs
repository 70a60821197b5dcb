//! Provenance block embedded in document headers.
//!
//! Records where a canonical record came from: the capture context, when it
//! was captured, who reviewed it, and the ranked list of contributing sources.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::defaults::PROVENANCE_KEY;
use crate::error::Result;
use crate::models::SourceDocumentInput;

/// One ranked entry in the source priority list. `priority` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePriority {
    pub priority: usize,
    pub source_uri: String,
    pub source_type: String,
    pub weight: f64,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub capture_context: String,
    /// RFC 3339, UTC.
    pub ingestion_timestamp: String,
    pub reviewer_identities: Vec<String>,
    pub source_priorities: Vec<SourcePriority>,
}

impl Provenance {
    pub fn new(
        capture_context: &str,
        captured_at: DateTime<Utc>,
        reviewers: &[String],
        sources: &[SourceDocumentInput],
    ) -> Self {
        Self {
            capture_context: capture_context.to_string(),
            ingestion_timestamp: captured_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            reviewer_identities: normalize_reviewers(reviewers),
            source_priorities: rank_sources(sources),
        }
    }
}

/// Trim, drop blanks, and de-duplicate while keeping first-seen order.
pub fn normalize_reviewers(reviewers: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(reviewers.len());
    for reviewer in reviewers {
        let trimmed = reviewer.trim();
        if !trimmed.is_empty() && !seen.iter().any(|s: &String| s == trimmed) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}

/// Rank sources by descending weight. Equal weights keep input order.
pub fn rank_sources(sources: &[SourceDocumentInput]) -> Vec<SourcePriority> {
    let mut ordered: Vec<&SourceDocumentInput> = sources.iter().collect();
    // sort_by is stable
    ordered.sort_by(|a, b| heavier_first(a.weight, b.weight));
    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, source)| SourcePriority {
            priority: idx + 1,
            source_uri: source.source_uri.clone(),
            source_type: source.source_type.clone(),
            weight: source.weight,
            content_hash: source.content_hash.clone(),
        })
        .collect()
}

/// Descending weight order for stable sorts.
///
/// `-0.0` and `+0.0` compare equal so the earlier input keeps its place.
/// NaN sorts last.
pub fn heavier_first(a: f64, b: f64) -> Ordering {
    fn key(w: f64) -> f64 {
        if w.is_nan() {
            f64::NEG_INFINITY
        } else {
            w + 0.0
        }
    }
    key(b).total_cmp(&key(a))
}

/// Return a copy of a header payload with the provenance block attached.
pub fn attach_provenance(
    payload: &Map<String, JsonValue>,
    provenance: &Provenance,
) -> Result<JsonValue> {
    let mut merged = payload.clone();
    merged.insert(PROVENANCE_KEY.to_string(), serde_json::to_value(provenance)?);
    Ok(JsonValue::Object(merged))
}
