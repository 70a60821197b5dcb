//! Reference normalizer.
//!
//! Scores come from a per-source-type table, optionally overridden by the
//! caller. The fragment is a minimal document whose header carries the
//! inferred title and the source identity, with the content as paragraphs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use canon_core::defaults::{FALLBACK_SCORE, TITLE_MAX_CHARS};
use canon_core::{escape_xml, Result, SourceDocumentInput};

use crate::ports::SourceNormalizer;
use crate::types::{NormalizedSource, RawSourceInput};

/// Quality, freshness and reliability for one source type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceScores {
    #[serde(default = "fallback_score")]
    pub quality: f64,
    #[serde(default = "fallback_score")]
    pub freshness: f64,
    #[serde(default = "fallback_score")]
    pub reliability: f64,
}

fn fallback_score() -> f64 {
    FALLBACK_SCORE
}

impl SourceScores {
    pub const FALLBACK: SourceScores = SourceScores::new(FALLBACK_SCORE, FALLBACK_SCORE, FALLBACK_SCORE);

    pub const fn new(quality: f64, freshness: f64, reliability: f64) -> Self {
        Self {
            quality,
            freshness,
            reliability,
        }
    }

    fn clamped(self) -> Self {
        Self::new(clamp_unit(self.quality), clamp_unit(self.freshness), clamp_unit(self.reliability))
    }
}

impl Default for SourceScores {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Built-in score table for the known source types.
pub const DEFAULT_SCORES: [(&str, SourceScores); 5] = [
    ("transcript", SourceScores::new(0.9, 0.8, 0.9)),
    ("brief", SourceScores::new(0.8, 0.7, 0.8)),
    ("rss", SourceScores::new(0.6, 1.0, 0.5)),
    ("press_release", SourceScores::new(0.7, 0.6, 0.7)),
    ("research_notes", SourceScores::new(0.5, 0.5, 0.6)),
];

/// Table-driven normalizer. Pure: the same input always yields the same output.
#[derive(Debug, Clone)]
pub struct DefaultSourceNormalizer {
    overrides: HashMap<String, SourceScores>,
    title_max_chars: usize,
}

impl Default for DefaultSourceNormalizer {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
            title_max_chars: TITLE_MAX_CHARS,
        }
    }
}

impl DefaultSourceNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scores for one source type.
    pub fn with_override(mut self, source_type: impl Into<String>, scores: SourceScores) -> Self {
        self.overrides.insert(source_type.into(), scores);
        self
    }

    /// Replace scores for several source types at once.
    pub fn with_overrides(mut self, overrides: HashMap<String, SourceScores>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn with_title_max_chars(mut self, max_chars: usize) -> Self {
        self.title_max_chars = max_chars;
        self
    }

    /// Scores for `source_type`, clamped to `[0, 1]`.
    pub fn scores_for(&self, source_type: &str) -> SourceScores {
        self.overrides
            .get(source_type)
            .copied()
            .or_else(|| {
                DEFAULT_SCORES
                    .iter()
                    .find(|(name, _)| *name == source_type)
                    .map(|(_, scores)| *scores)
            })
            .unwrap_or(SourceScores::FALLBACK)
            .clamped()
    }

    /// Title from metadata, then the first content line, then the source type.
    pub fn infer_title(&self, raw: &RawSourceInput) -> String {
        if let Some(title) = raw.metadata.get("title").and_then(|v| v.as_str()) {
            let trimmed = title.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }

        if let Some(line) = raw.content.lines().map(str::trim).find(|l| !l.is_empty()) {
            return line.chars().take(self.title_max_chars).collect();
        }

        humanize(&raw.source_type)
    }

    fn normalize_sync(&self, raw: &RawSourceInput) -> NormalizedSource {
        let title = self.infer_title(raw);
        let scores = self.scores_for(&raw.source_type);

        trace!(
            subsystem = "ingest",
            component = "normalizer",
            source_uri = %raw.source_uri,
            source_type = %raw.source_type,
            quality = scores.quality,
            freshness = scores.freshness,
            reliability = scores.reliability,
            "Normalized source"
        );

        NormalizedSource {
            fragment: build_fragment(&title, raw),
            source_input: SourceDocumentInput {
                source_type: raw.source_type.clone(),
                source_uri: raw.source_uri.clone(),
                weight: 0.0,
                content_hash: raw.content_hash.clone(),
                metadata: raw.metadata.clone(),
            },
            title,
            quality_score: scores.quality,
            freshness_score: scores.freshness,
            reliability_score: scores.reliability,
        }
    }
}

#[async_trait]
impl SourceNormalizer for DefaultSourceNormalizer {
    async fn normalize(&self, raw: &RawSourceInput) -> Result<NormalizedSource> {
        Ok(self.normalize_sync(raw))
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return FALLBACK_SCORE;
    }
    value.clamp(0.0, 1.0)
}

/// `press_release` -> `Press Release`.
fn humanize(source_type: &str) -> String {
    let mut out = String::with_capacity(source_type.len());
    let mut word_start = true;
    for ch in source_type.replace('_', " ").chars() {
        if ch.is_alphabetic() {
            if word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(ch);
            word_start = true;
        }
    }
    out
}

/// Content paragraphs are separated by blank lines; lines within one are joined.
fn paragraphs(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}

fn build_fragment(title: &str, raw: &RawSourceInput) -> String {
    let mut xml = String::with_capacity(raw.content.len() + 256);
    xml.push_str("<document><header>");
    xml.push_str(&format!("<title>{}</title>", escape_xml(title)));
    xml.push_str(&format!("<source_type>{}</source_type>", escape_xml(&raw.source_type)));
    xml.push_str(&format!("<source_uri>{}</source_uri>", escape_xml(&raw.source_uri)));
    xml.push_str("</header><body>");
    for para in paragraphs(&raw.content) {
        xml.push_str(&format!("<p>{}</p>", escape_xml(&para)));
    }
    xml.push_str("</body></document>");
    xml
}
