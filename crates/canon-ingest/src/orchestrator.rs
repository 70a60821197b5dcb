//! Multi-source ingestion.
//!
//! Normalizes every raw source concurrently, weights the batch, resolves the
//! conflict, stamps the resolution onto every source and persists the merged
//! record through [`ingest_sources`].

use std::time::Instant;

use serde_json::{json, Value as JsonValue};
use tracing::info;

use canon_core::defaults::{CONFLICT_RESOLUTION_KEY, NORMALIZE_OPERATION};
use canon_core::{
    CanonicalRecord, Error, IngestionRequest, Result, SeriesProfile, SourceDocumentInput,
    UnitOfWork,
};

use crate::ports::IngestionPipeline;
use crate::service::ingest_sources;
use crate::tasks::{gather_ordered, TaskMetadata};
use crate::types::{ConflictOutcome, MultiSourceRequest, WeightingResult};

/// Reject requests that cannot be ingested, before any work starts.
pub fn validate_request(request: &MultiSourceRequest, profile: &SeriesProfile) -> Result<()> {
    if request.raw_sources.is_empty() {
        return Err(Error::Validation(
            "At least one raw source is required for multi-source ingestion.".to_string(),
        ));
    }
    if request.series_slug != profile.slug {
        return Err(Error::Validation(format!(
            "Series slug mismatch: request has '{}' but profile has '{}'.",
            request.series_slug, profile.slug
        )));
    }
    Ok(())
}

/// Normalize, weight, resolve and persist `request` as one canonical record.
///
/// Nothing is written unless every source normalizes. The first normalization
/// failure cancels the others and is returned unchanged.
pub async fn ingest_multi_source(
    uow: &mut dyn UnitOfWork,
    profile: &SeriesProfile,
    request: MultiSourceRequest,
    pipeline: &IngestionPipeline,
) -> Result<CanonicalRecord> {
    validate_request(&request, profile)?;
    let start = Instant::now();

    let tasks: Vec<_> = request
        .raw_sources
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let metadata = TaskMetadata::new()
                .operation(NORMALIZE_OPERATION)
                .correlation_id(request.series_slug.as_str())
                .priority_hint(idx as i64);
            (metadata, pipeline.normalizer.normalize(raw))
        })
        .collect();
    let normalized = gather_ordered(tasks).await?;

    let weighted = pipeline
        .weighting
        .compute_weights(normalized, &profile.configuration)
        .await?;
    if weighted.len() != request.raw_sources.len() {
        return Err(Error::Internal(format!(
            "weighting returned {} results for {} sources",
            weighted.len(),
            request.raw_sources.len()
        )));
    }

    // The resolver consumes its input, so keep the input-ordered copy for persistence.
    let outcome = pipeline.resolver.resolve(weighted.clone()).await?;
    let conflict_metadata = conflict_metadata(&outcome);
    let sources = enrich_sources(&weighted, &conflict_metadata);

    let preferred = outcome.preferred_sources.len();
    let rejected = outcome.rejected_sources.len();
    let source_count = sources.len();
    let record = ingest_sources(
        uow,
        profile,
        IngestionRequest {
            document: outcome.content,
            sources,
            requested_by: request.requested_by,
        },
    )
    .await?;

    info!(
        subsystem = "ingest",
        component = "orchestrator",
        op = "ingest_multi_source",
        record_id = %record.id,
        series_slug = %profile.slug,
        source_count,
        preferred,
        rejected,
        duration_ms = start.elapsed().as_millis() as u64,
        "Multi-source ingestion complete"
    );
    Ok(record)
}

/// Audit block attached to every persisted source.
pub fn conflict_metadata(outcome: &ConflictOutcome) -> JsonValue {
    let uris = |results: &[WeightingResult]| -> Vec<String> {
        results
            .iter()
            .map(|r| r.source.source_input.source_uri.clone())
            .collect()
    };
    json!({
        "preferred_sources": uris(&outcome.preferred_sources),
        "rejected_sources": uris(&outcome.rejected_sources),
        "resolution_notes": outcome.resolution_notes,
    })
}

/// Replace placeholder weights and attach the resolution block, in input order.
fn enrich_sources(weighted: &[WeightingResult], conflict: &JsonValue) -> Vec<SourceDocumentInput> {
    weighted
        .iter()
        .map(|result| {
            let mut input = result.source.source_input.clone();
            input.weight = result.computed_weight;
            input
                .metadata
                .insert(CONFLICT_RESOLUTION_KEY.to_string(), conflict.clone());
            input
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(slug: &str) -> SeriesProfile {
        let now = Utc::now();
        SeriesProfile {
            id: canon_core::new_v7(),
            slug: slug.into(),
            title: "Morning Brief".into(),
            description: None,
            configuration: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validate_rejects_empty_sources() {
        let request = MultiSourceRequest {
            raw_sources: Vec::new(),
            series_slug: "morning-brief".into(),
            requested_by: None,
        };
        let err = validate_request(&request, &profile("morning-brief")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: At least one raw source is required for multi-source ingestion."
        );
    }

    #[test]
    fn test_validate_rejects_slug_mismatch() {
        let request = MultiSourceRequest {
            raw_sources: vec![crate::types::RawSourceInput::new("rss", "u", "c")],
            series_slug: "evening".into(),
            requested_by: None,
        };
        let err = validate_request(&request, &profile("morning-brief")).unwrap_err();
        assert!(err.is_validation());
        assert!(err
            .to_string()
            .contains("request has 'evening' but profile has 'morning-brief'"));
    }
}
