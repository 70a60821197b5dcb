//! CPU executor for pure per-item work.
//!
//! Batch work is moved off the async runtime with `spawn_blocking` and spread
//! across a dedicated rayon pool. Results always come back in input order.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use canon_core::{Error, Result};

/// Where batch CPU work runs.
#[derive(Clone, Default)]
pub enum CpuExecutor {
    /// On the calling task.
    #[default]
    Inline,
    /// On a dedicated rayon pool, reached through `spawn_blocking`.
    Pool(Arc<rayon::ThreadPool>),
}

impl CpuExecutor {
    /// Build a bounded pool. `None` uses rayon's CPU-count default.
    pub fn pool(max_workers: Option<usize>) -> Result<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|idx| format!("canon-cpu-{}", idx));
        if let Some(n) = max_workers {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build worker pool: {}", e)))?;

        debug!(
            subsystem = "ingest",
            component = "executor",
            op = "pool_created",
            worker_count = pool.current_num_threads(),
            "CPU worker pool ready"
        );
        Ok(Self::Pool(Arc::new(pool)))
    }

    pub fn is_pool(&self) -> bool {
        matches!(self, Self::Pool(_))
    }

    /// Apply `f` to every item, preserving order.
    pub async fn map_ordered<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        match self {
            Self::Inline => Ok(items.into_iter().map(f).collect()),
            Self::Pool(pool) => {
                let pool = Arc::clone(pool);
                // into_par_iter over a Vec is indexed, so collect keeps input order
                tokio::task::spawn_blocking(move || {
                    pool.install(|| items.into_par_iter().map(f).collect::<Vec<R>>())
                })
                .await
                .map_err(|e| Error::Internal(format!("worker pool task failed: {}", e)))
            }
        }
    }
}

impl std::fmt::Debug for CpuExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline => f.write_str("Inline"),
            Self::Pool(pool) => f
                .debug_struct("Pool")
                .field("workers", &pool.current_num_threads())
                .finish(),
        }
    }
}
