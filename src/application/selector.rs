//! Ranking and selection of evaluated sequences.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::domain::error::DomainError;
use crate::domain::values::action::ActionSequence;
use crate::domain::values::audit::{RejectedSequence, RejectionReason};
use crate::domain::values::evaluation::{EvaluationResult, InfeasibilityReason};
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::trade_side::TradeSide;

#[derive(Debug)]
pub struct Selection<'a> {
    pub winner: Option<(&'a ActionSequence, &'a EvaluationResult)>,
    /// Every evaluated candidate except the winner, in ranked order.
    pub rejected: Vec<RejectedSequence>,
}

type Keys<'a> = HashSet<(&'a str, TradeSide)>;

fn keys(sequence: &ActionSequence) -> Keys<'_> {
    sequence
        .actions
        .iter()
        .map(|a| (a.symbol.as_str(), a.side))
        .collect()
}

fn jaccard(a: &Keys<'_>, b: &Keys<'_>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn by_score(results: &[EvaluationResult], a: usize, b: usize) -> Ordering {
    let (ra, rb) = (&results[a], &results[b]);
    rb.end_score
        .total_cmp(&ra.end_score)
        .then_with(|| ra.sequence_hash.cmp(&rb.sequence_hash))
}

/// Greedy re-ranking: each pick is the candidate whose score, discounted by
/// its largest overlap with anything already picked, is highest.
fn diversify(order: Vec<usize>, sequences: &[ActionSequence], results: &[EvaluationResult], weight: f64) -> Vec<usize> {
    if order.len() < 2 {
        return order;
    }
    let key_sets: Vec<Keys<'_>> = order.iter().map(|&i| keys(&sequences[i])).collect();
    let mut overlap = vec![0.0_f64; order.len()];
    let mut picked = vec![false; order.len()];
    let mut ranked = Vec::with_capacity(order.len());

    let mut last = 0;
    picked[0] = true;
    ranked.push(order[0]);

    while ranked.len() < order.len() {
        let mut best: Option<(usize, f64)> = None;
        for pos in 0..order.len() {
            if picked[pos] {
                continue;
            }
            overlap[pos] = overlap[pos].max(jaccard(&key_sets[pos], &key_sets[last]));
            let adjusted = results[order[pos]].end_score * (1.0 - weight * overlap[pos]);
            // Strict comparison keeps the earlier position on ties.
            if best.map_or(true, |(_, s)| adjusted > s) {
                best = Some((pos, adjusted));
            }
        }
        let Some((pos, _)) = best else { break };
        picked[pos] = true;
        last = pos;
        ranked.push(order[pos]);
    }
    ranked
}

/// Picks the best feasible sequence and records why every other candidate
/// lost. `results[i]` must belong to `sequences[i]`.
pub fn select<'a>(
    sequences: &'a [ActionSequence],
    results: &'a [EvaluationResult],
    config: &PlannerConfiguration,
) -> Result<Selection<'a>, DomainError> {
    if sequences.len() != results.len() {
        return Err(DomainError::Evaluation(format!(
            "{} results for {} sequences",
            results.len(),
            sequences.len()
        )));
    }

    let (mut feasible, mut infeasible): (Vec<usize>, Vec<usize>) =
        (0..results.len()).partition(|&i| results[i].feasible);
    feasible.sort_by(|&a, &b| by_score(results, a, b));
    infeasible.sort_by(|&a, &b| by_score(results, a, b));

    if config.enable_diverse_selection && config.diversity_weight > 0.0 {
        feasible = diversify(feasible, sequences, results, config.diversity_weight);
    }

    let winner = feasible.first().map(|&i| (&sequences[i], &results[i]));
    let skip = usize::from(winner.is_some());

    let rejected = feasible
        .iter()
        .chain(&infeasible)
        .enumerate()
        .skip(skip)
        .map(|(pos, &i)| {
            let result = &results[i];
            let reason = if result.feasible {
                RejectionReason::LowerScore
            } else {
                RejectionReason::Infeasible(
                    result
                        .infeasibility
                        .unwrap_or(InfeasibilityReason::InsufficientCash),
                )
            };
            RejectedSequence {
                rank: pos + 1,
                pattern: sequences[i].pattern.clone(),
                sequence_hash: result.sequence_hash.clone(),
                actions: sequences[i].actions.clone(),
                score: result.end_score,
                feasible: result.feasible,
                reason,
            }
        })
        .collect();

    Ok(Selection { winner, rejected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::patterns::fixtures::candidate;
    use crate::domain::values::evaluation::ScoreBreakdown;
    use crate::domain::values::opportunity::OpportunityCategory::*;
    use crate::domain::values::trade_side::TradeSide::*;
    use std::collections::BTreeMap;

    fn result(seq: &ActionSequence, score: f64, infeasible: Option<InfeasibilityReason>) -> EvaluationResult {
        EvaluationResult {
            sequence_hash: seq.hash(),
            portfolio_hash: "p".into(),
            end_score: score,
            breakdown: ScoreBreakdown::default(),
            end_cash_eur: 0.0,
            end_positions: BTreeMap::new(),
            total_value_eur: 0.0,
            feasible: infeasible.is_none(),
            infeasibility: infeasible,
        }
    }

    fn seq(symbols: &[&str]) -> ActionSequence {
        ActionSequence::new(
            "test",
            symbols
                .iter()
                .map(|s| candidate(OpportunityBuys, Buy, s, 10.0, 0.5))
                .collect(),
        )
    }

    #[test]
    fn best_feasible_wins_and_others_are_ranked() {
        let sequences = vec![seq(&["A"]), seq(&["B"]), seq(&["C"])];
        let results = vec![
            result(&sequences[0], 0.9, Some(InfeasibilityReason::InsufficientCash)),
            result(&sequences[1], 0.6, None),
            result(&sequences[2], 0.7, None),
        ];
        let config = PlannerConfiguration {
            enable_diverse_selection: false,
            ..Default::default()
        };
        let selection = select(&sequences, &results, &config).unwrap();
        let (winner, _) = selection.winner.unwrap();
        assert_eq!(winner.actions[0].symbol, "C");

        assert_eq!(selection.rejected.len(), 2);
        assert_eq!(selection.rejected[0].rank, 2);
        assert_eq!(selection.rejected[0].reason, RejectionReason::LowerScore);
        assert_eq!(selection.rejected[1].rank, 3);
        assert_eq!(
            selection.rejected[1].reason,
            RejectionReason::Infeasible(InfeasibilityReason::InsufficientCash)
        );
    }

    #[test]
    fn diversity_penalizes_near_duplicates() {
        let sequences = vec![seq(&["A", "B"]), seq(&["A", "B", "C"]), seq(&["D"])];
        let results = vec![
            result(&sequences[0], 0.80, None),
            result(&sequences[1], 0.79, None),
            result(&sequences[2], 0.70, None),
        ];
        let config = PlannerConfiguration {
            diversity_weight: 0.5,
            ..Default::default()
        };
        let selection = select(&sequences, &results, &config).unwrap();
        assert_eq!(selection.winner.unwrap().0.actions.len(), 2);
        assert_eq!(selection.rejected[0].actions[0].symbol, "D");
    }

    #[test]
    fn no_feasible_candidate_means_no_winner() {
        let sequences = vec![seq(&["A"])];
        let results = vec![result(&sequences[0], 0.0, Some(InfeasibilityReason::ConflictingActions))];
        let selection = select(&sequences, &results, &PlannerConfiguration::default()).unwrap();
        assert!(selection.winner.is_none());
        assert_eq!(selection.rejected.len(), 1);
        assert_eq!(selection.rejected[0].rank, 1);
    }

    #[test]
    fn mismatched_lengths_are_an_error() {
        let sequences = vec![seq(&["A"])];
        assert!(select(&sequences, &[], &PlannerConfiguration::default()).is_err());
    }
}
