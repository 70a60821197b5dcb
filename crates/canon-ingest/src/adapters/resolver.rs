//! Highest-weight-wins conflict resolution.

use async_trait::async_trait;
use tracing::debug;

use canon_core::{heavier_first, Error, Result};

use crate::ports::ConflictResolver;
use crate::types::{ConflictOutcome, WeightingResult};

/// Picks the heaviest source as canonical. Ties go to the earliest input.
///
/// Every other source is rejected but kept, with its weight and factors, so
/// the decision can be audited later.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighestWeightConflictResolver;

#[async_trait]
impl ConflictResolver for HighestWeightConflictResolver {
    async fn resolve(&self, weighted: Vec<WeightingResult>) -> Result<ConflictOutcome> {
        resolve_highest_weight(weighted)
    }
}

/// Synchronous core of [`HighestWeightConflictResolver`].
pub fn resolve_highest_weight(mut weighted: Vec<WeightingResult>) -> Result<ConflictOutcome> {
    if weighted.is_empty() {
        return Err(Error::Validation(
            "Cannot resolve conflicts with no sources.".to_string(),
        ));
    }

    // sort_by is stable, so equal weights keep input order
    weighted.sort_by(|a, b| heavier_first(a.computed_weight, b.computed_weight));
    let mut ranked = weighted.into_iter();
    let Some(winner) = ranked.next() else {
        return Err(Error::Internal("ranked sources vanished".into()));
    };
    let rejected: Vec<WeightingResult> = ranked.collect();

    let resolution_notes = resolution_notes(&winner, &rejected);
    debug!(
        subsystem = "ingest",
        component = "resolver",
        op = "resolve",
        preferred = %winner.source.source_input.source_uri,
        rejected_count = rejected.len(),
        "Resolved source conflicts"
    );

    Ok(ConflictOutcome {
        content: winner.source.fragment.clone(),
        title: winner.source.title.clone(),
        preferred_sources: vec![winner],
        rejected_sources: rejected,
        resolution_notes,
    })
}

fn resolution_notes(winner: &WeightingResult, rejected: &[WeightingResult]) -> String {
    if rejected.is_empty() {
        return format!(
            "Single source '{}' selected as canonical (weight {:.3}). No conflicts to resolve.",
            winner.source.title, winner.computed_weight
        );
    }

    let mut notes = vec![format!(
        "Source '{}' selected as canonical (weight {:.3}).",
        winner.source.title, winner.computed_weight
    )];
    notes.extend(rejected.iter().map(|loser| {
        format!(
            "Source '{}' rejected (weight {:.3}).",
            loser.source.title, loser.computed_weight
        )
    }));
    notes.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use canon_core::SourceDocumentInput;
    use serde_json::Map;

    use crate::types::NormalizedSource;

    fn weighted(title: &str, weight: f64) -> WeightingResult {
        WeightingResult {
            source: NormalizedSource {
                source_input: SourceDocumentInput {
                    source_type: "brief".into(),
                    source_uri: format!("uri://{}", title),
                    weight: 0.0,
                    content_hash: String::new(),
                    metadata: Map::new(),
                },
                title: title.into(),
                fragment: format!("<document><header><title>{}</title></header></document>", title),
                quality_score: weight,
                freshness_score: weight,
                reliability_score: weight,
            },
            computed_weight: weight,
            factors: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let err = HighestWeightConflictResolver.resolve(Vec::new()).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Validation error: Cannot resolve conflicts with no sources."
        );
    }

    #[tokio::test]
    async fn test_single_source_note() {
        let outcome = HighestWeightConflictResolver
            .resolve(vec![weighted("Only", 0.87)])
            .await
            .unwrap();

        assert_eq!(outcome.preferred_sources.len(), 1);
        assert!(outcome.rejected_sources.is_empty());
        assert_eq!(
            outcome.resolution_notes,
            "Single source 'Only' selected as canonical (weight 0.870). No conflicts to resolve."
        );
    }

    #[tokio::test]
    async fn test_heaviest_wins_and_losers_are_listed() {
        let outcome = HighestWeightConflictResolver
            .resolve(vec![weighted("Low", 0.3), weighted("High", 0.87), weighted("Mid", 0.5)])
            .await
            .unwrap();

        assert_eq!(outcome.title, "High");
        assert!(outcome.content.contains("<title>High</title>"));
        let rejected: Vec<_> = outcome.rejected_sources.iter().map(|r| r.source.title.as_str()).collect();
        assert_eq!(rejected, vec!["Mid", "Low"]);
        assert_eq!(
            outcome.resolution_notes,
            "Source 'High' selected as canonical (weight 0.870). \
             Source 'Mid' rejected (weight 0.500). \
             Source 'Low' rejected (weight 0.300)."
        );
    }

    #[test]
    fn test_ties_prefer_earliest_input() {
        let outcome =
            resolve_highest_weight(vec![weighted("First", 0.5), weighted("Second", 0.5)]).unwrap();
        assert_eq!(outcome.title, "First");
        assert_eq!(outcome.rejected_sources[0].source.title, "Second");
    }

    #[test]
    fn test_negative_coefficients_tie_at_zero_prefers_earliest() {
        use crate::adapters::weighting::{weigh_source, Coefficients};

        let coefficients = Coefficients {
            quality: -0.1,
            freshness: -0.1,
            reliability: -0.1,
        };
        let a = weigh_source(weighted("a", 0.0).source, coefficients);
        let b = weigh_source(weighted("b", 0.5).source, coefficients);
        assert_eq!(a.computed_weight, 0.0);
        assert!(a.computed_weight.is_sign_positive());
        assert_eq!(b.computed_weight, 0.0);

        let outcome = resolve_highest_weight(vec![a, b]).unwrap();
        assert_eq!(outcome.title, "a");
        assert_eq!(outcome.rejected_sources[0].source.title, "b");

        let outcome = resolve_highest_weight(vec![weighted("neg", -0.0), weighted("pos", 0.0)]).unwrap();
        assert_eq!(outcome.title, "neg");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn resolution_partitions_input(weights in prop::collection::vec(0.0f64..=1.0, 1..24)) {
                let input: Vec<WeightingResult> = weights
                    .iter()
                    .enumerate()
                    .map(|(i, w)| weighted(&format!("s{}", i), *w))
                    .collect();
                let outcome = resolve_highest_weight(input).unwrap();

                prop_assert_eq!(outcome.preferred_sources.len(), 1);
                prop_assert_eq!(
                    outcome.preferred_sources.len() + outcome.rejected_sources.len(),
                    weights.len()
                );

                let max = weights.iter().cloned().fold(f64::MIN, f64::max);
                let first_max = weights.iter().position(|w| *w == max).unwrap();
                let winner = &outcome.preferred_sources[0];
                prop_assert_eq!(winner.computed_weight, max);
                prop_assert_eq!(winner.source.title.clone(), format!("s{}", first_max));
            }
        }
    }
}
