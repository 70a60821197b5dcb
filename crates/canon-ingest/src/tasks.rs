//! Structured fan-out for concurrent pipeline stages.
//!
//! [`gather_ordered`] polls every future concurrently on the calling task and
//! returns results in submission order. The first failure drops every task
//! still in flight, which cancels them, and is returned as-is.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, Instrument};

use canon_core::{Error, Result};

/// Descriptive tags attached to a spawned unit of work.
///
/// Every field is optional, but string fields must not be empty when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskMetadata {
    pub operation_name: Option<String>,
    pub correlation_id: Option<String>,
    pub priority_hint: Option<i64>,
}

impl TaskMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn priority_hint(mut self, hint: i64) -> Self {
        self.priority_hint = Some(hint);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("operation_name", &self.operation_name),
            ("correlation_id", &self.correlation_id),
        ] {
            if matches!(value, Some(v) if v.is_empty()) {
                return Err(Error::Validation(format!(
                    "Task metadata '{}' must be a non-empty string.",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Span carrying these tags. Unset fields are recorded as empty.
    pub fn span(&self) -> tracing::Span {
        let span = tracing::info_span!(
            "task",
            op = tracing::field::Empty,
            correlation_id = tracing::field::Empty,
            priority_hint = tracing::field::Empty,
        );
        if let Some(ref name) = self.operation_name {
            span.record("op", name.as_str());
        }
        if let Some(ref id) = self.correlation_id {
            span.record("correlation_id", id.as_str());
        }
        if let Some(hint) = self.priority_hint {
            span.record("priority_hint", hint);
        }
        span
    }
}

/// Run `tasks` concurrently and collect their outputs in submission order.
///
/// Metadata is validated before anything is polled. On the first error the
/// remaining futures are dropped without being polled to completion.
pub async fn gather_ordered<T, Fut>(tasks: Vec<(TaskMetadata, Fut)>) -> Result<Vec<T>>
where
    Fut: Future<Output = Result<T>>,
{
    for (metadata, _) in &tasks {
        metadata.validate()?;
    }

    let total = tasks.len();
    let mut in_flight: FuturesUnordered<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(idx, (metadata, fut))| {
            let span = metadata.span();
            async move { (idx, fut.await) }.instrument(span)
        })
        .collect();

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some((idx, result)) = in_flight.next().await {
        match result {
            Ok(value) => slots[idx] = Some(value),
            Err(e) => {
                // returning drops `in_flight`, cancelling what is left
                debug!(
                    subsystem = "ingest",
                    component = "tasks",
                    op = "gather_ordered",
                    failed_index = idx,
                    cancelled = in_flight.len(),
                    error = %e,
                    "Task failed, cancelled remaining siblings"
                );
                return Err(e);
            }
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| Error::Internal("gathered task produced no result".into())))
        .collect()
}
