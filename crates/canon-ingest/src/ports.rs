//! Capability ports for multi-source ingestion.
//!
//! Each stage of the pipeline is a trait so adapters can be swapped without
//! touching the orchestrator. [`IngestionPipeline`] bundles one adapter per
//! stage and is what callers hand to
//! [`ingest_multi_source`](crate::ingest_multi_source).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use canon_core::Result;

use crate::adapters::{DefaultSourceNormalizer, DefaultWeightingStrategy, HighestWeightConflictResolver};
use crate::config::IngestConfig;
use crate::types::{ConflictOutcome, NormalizedSource, RawSourceInput, WeightingResult};

/// Turns one raw source into a normalized fragment with quality scores.
#[async_trait]
pub trait SourceNormalizer: Send + Sync {
    async fn normalize(&self, raw: &RawSourceInput) -> Result<NormalizedSource>;
}

/// Assigns a weight in `[0, 1]` to every normalized source.
///
/// Implementations must return exactly one result per input, in input order.
#[async_trait]
pub trait WeightingStrategy: Send + Sync {
    async fn compute_weights(
        &self,
        sources: Vec<NormalizedSource>,
        series_configuration: &JsonValue,
    ) -> Result<Vec<WeightingResult>>;
}

/// Picks the canonical content from a set of weighted sources.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    /// Fails with a validation error when `weighted` is empty.
    async fn resolve(&self, weighted: Vec<WeightingResult>) -> Result<ConflictOutcome>;
}

/// One adapter per pipeline stage.
#[derive(Clone)]
pub struct IngestionPipeline {
    pub normalizer: Arc<dyn SourceNormalizer>,
    pub weighting: Arc<dyn WeightingStrategy>,
    pub resolver: Arc<dyn ConflictResolver>,
}

impl IngestionPipeline {
    pub fn new(
        normalizer: Arc<dyn SourceNormalizer>,
        weighting: Arc<dyn WeightingStrategy>,
        resolver: Arc<dyn ConflictResolver>,
    ) -> Self {
        Self {
            normalizer,
            weighting,
            resolver,
        }
    }

    /// Reference adapters configured from `config`.
    ///
    /// Builds a dedicated worker pool when `config.worker_pool` is set.
    pub fn reference(config: &IngestConfig) -> Result<Self> {
        let normalizer = DefaultSourceNormalizer::new().with_title_max_chars(config.title_max_chars);
        let weighting = DefaultWeightingStrategy::new()
            .with_batch_threshold(config.weighting_batch_threshold)
            .with_executor(config.executor()?);

        Ok(Self::new(
            Arc::new(normalizer),
            Arc::new(weighting),
            Arc::new(HighestWeightConflictResolver),
        ))
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline").finish_non_exhaustive()
    }
}
