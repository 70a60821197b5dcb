//! Ingestion configuration.

use canon_core::defaults::{TITLE_MAX_CHARS, WEIGHTING_BATCH_THRESHOLD};
use canon_core::Result;

use crate::executor::CpuExecutor;

/// Tunables for the reference pipeline.
///
/// | Variable | Default |
/// |----------|---------|
/// | `CANON_WEIGHTING_BATCH_THRESHOLD` | 64 |
/// | `CANON_WORKER_POOL` | false |
/// | `CANON_WORKER_POOL_MAX_WORKERS` | rayon default |
/// | `CANON_TITLE_MAX_CHARS` | 120 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Batches at or above this size are weighted on the worker pool.
    pub weighting_batch_threshold: usize,
    /// Build a dedicated worker pool for batch weighting.
    pub worker_pool: bool,
    /// Worker pool size. `None` lets rayon size it from the CPU count.
    pub worker_pool_max_workers: Option<usize>,
    pub title_max_chars: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            weighting_batch_threshold: WEIGHTING_BATCH_THRESHOLD,
            worker_pool: false,
            worker_pool_max_workers: None,
            title_max_chars: TITLE_MAX_CHARS,
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse_usize = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        Self {
            weighting_batch_threshold: parse_usize("CANON_WEIGHTING_BATCH_THRESHOLD")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.weighting_batch_threshold),
            worker_pool: lookup("CANON_WORKER_POOL")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.worker_pool),
            worker_pool_max_workers: parse_usize("CANON_WORKER_POOL_MAX_WORKERS").filter(|n| *n > 0),
            title_max_chars: parse_usize("CANON_TITLE_MAX_CHARS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.title_max_chars),
        }
    }

    pub fn with_worker_pool(mut self, max_workers: Option<usize>) -> Self {
        self.worker_pool = true;
        self.worker_pool_max_workers = max_workers;
        self
    }

    /// The executor this configuration selects.
    pub fn executor(&self) -> Result<CpuExecutor> {
        if self.worker_pool {
            CpuExecutor::pool(self.worker_pool_max_workers)
        } else {
            Ok(CpuExecutor::Inline)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = IngestConfig::from_lookup(lookup(&[]));
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.weighting_batch_threshold, 64);
        assert!(!config.worker_pool);
        assert!(matches!(config.executor().unwrap(), CpuExecutor::Inline));
    }

    #[test]
    fn test_reads_overrides() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("CANON_WEIGHTING_BATCH_THRESHOLD", "8"),
            ("CANON_WORKER_POOL", "true"),
            ("CANON_WORKER_POOL_MAX_WORKERS", "2"),
            ("CANON_TITLE_MAX_CHARS", "40"),
        ]));
        assert_eq!(config.weighting_batch_threshold, 8);
        assert!(config.worker_pool);
        assert_eq!(config.worker_pool_max_workers, Some(2));
        assert_eq!(config.title_max_chars, 40);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = IngestConfig::from_lookup(lookup(&[
            ("CANON_WEIGHTING_BATCH_THRESHOLD", "zero"),
            ("CANON_WORKER_POOL", "maybe"),
            ("CANON_WORKER_POOL_MAX_WORKERS", "0"),
            ("CANON_TITLE_MAX_CHARS", "0"),
        ]));
        assert_eq!(config.weighting_batch_threshold, 64);
        assert!(!config.worker_pool);
        assert!(config.worker_pool_max_workers.is_none());
        assert_eq!(config.title_max_chars, 120);
    }

    #[test]
    fn test_worker_pool_builds_executor() {
        let config = IngestConfig::default().with_worker_pool(Some(2));
        assert!(matches!(config.executor().unwrap(), CpuExecutor::Pool(_)));
    }
}
