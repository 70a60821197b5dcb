//! Structured logging schema and field name constants for canon.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query every subsystem the same way.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Operation failed and nothing was persisted |
//! | WARN  | Recoverable issue, rollback or fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration (per-source scores, per-row writes) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "ingest", "catalog", "db"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "weighting", "resolver", "engine", "pool", "uow"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "ingest_multi_source", "update", "compute_weights"
pub const OPERATION: &str = "op";

/// Correlation id shared by every task of one ingestion (the series slug).
pub const CORRELATION_ID: &str = "correlation_id";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Versioned entity kind ("series_profile", "episode_template").
pub const ENTITY_KIND: &str = "entity_kind";

/// Versioned entity UUID.
pub const ENTITY_ID: &str = "entity_id";

/// Canonical record UUID.
pub const RECORD_ID: &str = "record_id";

/// Ingestion job UUID.
pub const JOB_ID: &str = "job_id";

/// Series profile slug.
pub const SERIES_SLUG: &str = "series_slug";

/// Source URI of one ingested source.
pub const SOURCE_URI: &str = "source_uri";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of sources in an ingestion batch.
pub const SOURCE_COUNT: &str = "source_count";

/// Revision written by an update.
pub const REVISION: &str = "revision";

/// Revision the caller expected to be current.
pub const EXPECTED_REVISION: &str = "expected_revision";

/// Scheduling hint attached to a fan-out task (the source index).
pub const PRIORITY_HINT: &str = "priority_hint";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

/// Violated constraint name.
pub const CONSTRAINT: &str = "constraint";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
