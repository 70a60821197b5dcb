//! Centralized default constants for canon.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration types fall back to these when an environment variable is
//! unset or unparseable.

// =============================================================================
// SCORING
// =============================================================================

/// Quality/freshness/reliability score for source types missing from the table.
pub const FALLBACK_SCORE: f64 = 0.5;

/// Maximum characters kept when a title is inferred from the first content line.
pub const TITLE_MAX_CHARS: usize = 120;

// =============================================================================
// WEIGHTING
// =============================================================================

/// Coefficient applied to the quality score.
pub const QUALITY_COEFFICIENT: f64 = 0.5;

/// Coefficient applied to the freshness score.
pub const FRESHNESS_COEFFICIENT: f64 = 0.3;

/// Coefficient applied to the reliability score.
pub const RELIABILITY_COEFFICIENT: f64 = 0.2;

/// Batches at or above this size are weighted on the worker pool.
pub const WEIGHTING_BATCH_THRESHOLD: usize = 64;

/// Key of the weighting sub-object inside a series configuration.
pub const WEIGHTING_CONFIG_KEY: &str = "weighting";

// =============================================================================
// INGESTION
// =============================================================================

/// Capture context recorded in provenance for multi-source ingestion.
pub const CAPTURE_CONTEXT: &str = "source_ingestion";

/// Note attached to the first approval event of every record.
pub const INITIAL_APPROVAL_NOTE: &str = "Initial ingestion.";

/// Header payload key holding the provenance block.
pub const PROVENANCE_KEY: &str = "provenance";

/// Source metadata key holding the conflict-resolution audit block.
pub const CONFLICT_RESOLUTION_KEY: &str = "conflict_resolution";

/// Operation name attached to normalization tasks.
pub const NORMALIZE_OPERATION: &str = "normalize_source";

// =============================================================================
// STORAGE
// =============================================================================

/// Text payloads at or above this many UTF-8 bytes are considered for compression.
pub const COMPRESSION_MIN_BYTES: usize = 1024;

/// Placeholder stored in a text column whose value lives in the companion bytes column.
pub const COMPRESSED_SENTINEL: &str = "__canon_compressed__";

/// Default maximum number of database connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;
