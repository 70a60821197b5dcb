//! Reference pipeline adapters.

pub mod normalizer;
pub mod resolver;
pub mod weighting;

pub use normalizer::{DefaultSourceNormalizer, SourceScores, DEFAULT_SCORES};
pub use resolver::{resolve_highest_weight, HighestWeightConflictResolver};
pub use weighting::{weigh_source, Coefficients, DefaultWeightingStrategy};
