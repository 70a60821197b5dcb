//! Reference weighting strategy: a weighted average of the three scores.

use std::collections::BTreeMap;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

use canon_core::defaults::{
    FRESHNESS_COEFFICIENT, QUALITY_COEFFICIENT, RELIABILITY_COEFFICIENT, WEIGHTING_BATCH_THRESHOLD,
    WEIGHTING_CONFIG_KEY,
};
use canon_core::Result;

use crate::executor::CpuExecutor;
use crate::ports::WeightingStrategy;
use crate::types::{NormalizedSource, WeightingResult};

/// Coefficients applied to quality, freshness and reliability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub quality: f64,
    pub freshness: f64,
    pub reliability: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            quality: QUALITY_COEFFICIENT,
            freshness: FRESHNESS_COEFFICIENT,
            reliability: RELIABILITY_COEFFICIENT,
        }
    }
}

impl Coefficients {
    /// Read `weighting.*_coefficient` from a series configuration.
    ///
    /// Each value may be a JSON number or a numeric string. Anything else,
    /// including non-finite numbers, falls back to that coefficient's default.
    pub fn from_series_configuration(configuration: &JsonValue) -> Self {
        let defaults = Self::default();
        let Some(weighting) = configuration
            .get(WEIGHTING_CONFIG_KEY)
            .and_then(JsonValue::as_object)
        else {
            return defaults;
        };

        let read = |key: &str, default: f64| coerce_f64(weighting.get(key), default);
        Self {
            quality: read("quality_coefficient", defaults.quality),
            freshness: read("freshness_coefficient", defaults.freshness),
            reliability: read("reliability_coefficient", defaults.reliability),
        }
    }
}

fn coerce_f64(value: Option<&JsonValue>, default: f64) -> f64 {
    let parsed = match value {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(default)
}

/// Weight one source. Pure, so batch and inline paths agree bit for bit.
pub fn weigh_source(source: NormalizedSource, coefficients: Coefficients) -> WeightingResult {
    let raw_weight = source.quality_score * coefficients.quality
        + source.freshness_score * coefficients.freshness
        + source.reliability_score * coefficients.reliability;
    // clamp keeps -0.0, which must not rank below an equal +0.0
    let computed_weight = if raw_weight.is_nan() {
        0.0
    } else {
        raw_weight.clamp(0.0, 1.0) + 0.0
    };

    let factors = BTreeMap::from([
        ("quality_score".to_string(), source.quality_score),
        ("freshness_score".to_string(), source.freshness_score),
        ("reliability_score".to_string(), source.reliability_score),
        ("quality_coefficient".to_string(), coefficients.quality),
        ("freshness_coefficient".to_string(), coefficients.freshness),
        ("reliability_coefficient".to_string(), coefficients.reliability),
        ("raw_weight".to_string(), raw_weight),
    ]);

    WeightingResult {
        source,
        computed_weight,
        factors,
    }
}

/// Weighted-average strategy with optional batch offload.
#[derive(Debug, Clone)]
pub struct DefaultWeightingStrategy {
    batch_threshold: usize,
    executor: CpuExecutor,
}

impl Default for DefaultWeightingStrategy {
    fn default() -> Self {
        Self {
            batch_threshold: WEIGHTING_BATCH_THRESHOLD,
            executor: CpuExecutor::Inline,
        }
    }
}

impl DefaultWeightingStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold.max(1);
        self
    }

    pub fn with_executor(mut self, executor: CpuExecutor) -> Self {
        self.executor = executor;
        self
    }
}

#[async_trait]
impl WeightingStrategy for DefaultWeightingStrategy {
    async fn compute_weights(
        &self,
        sources: Vec<NormalizedSource>,
        series_configuration: &JsonValue,
    ) -> Result<Vec<WeightingResult>> {
        let start = Instant::now();
        let coefficients = Coefficients::from_series_configuration(series_configuration);
        let source_count = sources.len();

        let offload = source_count >= self.batch_threshold && self.executor.is_pool();
        let results = if offload {
            self.executor
                .map_ordered(sources, move |s| weigh_source(s, coefficients))
                .await?
        } else {
            sources
                .into_iter()
                .map(|s| weigh_source(s, coefficients))
                .collect()
        };

        debug!(
            subsystem = "ingest",
            component = "weighting",
            op = "compute_weights",
            source_count,
            offloaded = offload,
            quality_coefficient = coefficients.quality,
            freshness_coefficient = coefficients.freshness,
            reliability_coefficient = coefficients.reliability,
            duration_ms = start.elapsed().as_millis() as u64,
            "Computed source weights"
        );
        Ok(results)
    }
}
