//! # canon-core
//!
//! Core types, persistence ports, and error taxonomy for canon.
//!
//! canon merges multi-source material into one canonical record and guards
//! edits to series configuration with optimistic locking. This crate holds
//! what every other crate shares: the domain models, the unit-of-work
//! port, the header parser, and the provenance builder.

pub mod defaults;
pub mod error;
pub mod header;
pub mod logging;
pub mod models;
pub mod provenance;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{ConflictDetail, Error, Result};
pub use header::{escape_xml, parse_header, unescape_xml, HeaderError, HeaderPayload};
pub use models::*;
pub use provenance::{
    attach_provenance, heavier_first, normalize_reviewers, rank_sources, Provenance, SourcePriority,
};
pub use traits::*;
pub use uuid_utils::new_v7;
