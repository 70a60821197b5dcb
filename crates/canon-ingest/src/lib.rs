//! # canon-ingest
//!
//! Multi-source canonicalization for canon.
//!
//! This crate provides:
//! - Capability ports for normalization, weighting and conflict resolution
//! - Reference adapters for each port
//! - Ordered, fail-fast concurrent fan-out with task metadata
//! - Optional rayon offload for batch weighting
//! - Single-record and multi-source ingestion services
//!
//! ## Example
//!
//! ```ignore
//! use canon_ingest::{ingest_multi_source, IngestConfig, IngestionPipeline, MultiSourceRequest};
//! use canon_db::Database;
//!
//! let pipeline = IngestionPipeline::reference(&IngestConfig::from_env())?;
//! let mut uow = db.unit_of_work();
//! let record = ingest_multi_source(&mut uow, &profile, request, &pipeline).await?;
//! ```

pub mod adapters;
pub mod config;
pub mod executor;
pub mod orchestrator;
pub mod ports;
pub mod request_file;
pub mod service;
pub mod tasks;
pub mod types;

pub use adapters::{
    DefaultSourceNormalizer, DefaultWeightingStrategy, HighestWeightConflictResolver, SourceScores,
};
pub use config::IngestConfig;
pub use executor::CpuExecutor;
pub use orchestrator::{conflict_metadata, ingest_multi_source, validate_request};
pub use ports::{ConflictResolver, IngestionPipeline, SourceNormalizer, WeightingStrategy};
pub use request_file::load_request;
pub use service::ingest_sources;
pub use tasks::{gather_ordered, TaskMetadata};
pub use types::{
    content_sha256, ConflictOutcome, MultiSourceRequest, NormalizedSource, RawSourceInput,
    WeightingResult,
};
