pub mod scoring;
pub mod service;
pub mod simulation;

pub use service::EvaluationService;
pub use simulation::{EvaluationContext, PortfolioState};

use crate::domain::values::action::{ActionCandidate, ActionSequence};
use crate::domain::values::evaluation::{EvaluationResult, ScoreBreakdown};

/// Evaluates one sequence. Pure: the same sequence against the same context
/// always yields the same result.
pub fn evaluate_sequence(ctx: &EvaluationContext, sequence: &ActionSequence, portfolio_hash: &str) -> EvaluationResult {
    let sequence_hash = sequence.hash();
    match ctx.simulate(&sequence.actions) {
        Ok(end) => {
            let cost = ctx.costs.transaction_cost(&sequence.actions);
            let breakdown = scoring::score_state(&end, ctx, cost);
            EvaluationResult {
                sequence_hash,
                portfolio_hash: portfolio_hash.to_string(),
                end_score: breakdown.final_score,
                total_value_eur: end.total_value(),
                end_cash_eur: end.cash,
                end_positions: end.positions,
                breakdown,
                feasible: true,
                infeasibility: None,
            }
        }
        Err(reason) => EvaluationResult {
            sequence_hash,
            portfolio_hash: portfolio_hash.to_string(),
            end_score: 0.0,
            breakdown: ScoreBreakdown {
                start_score: ctx.start_score,
                ..ScoreBreakdown::default()
            },
            end_cash_eur: ctx.start.cash,
            end_positions: ctx.start.positions.clone(),
            total_value_eur: ctx.start.total_value(),
            feasible: false,
            infeasibility: Some(reason),
        },
    }
}

/// Final score after executing `actions` in order, or `None` when they are
/// infeasible. An empty slice scores the starting state.
pub fn score_actions(ctx: &EvaluationContext, actions: &[ActionCandidate]) -> Option<f64> {
    if actions.is_empty() {
        return Some(ctx.start_score);
    }
    let end = ctx.simulate(actions).ok()?;
    let cost = ctx.costs.transaction_cost(actions);
    Some(scoring::score_state(&end, ctx, cost).final_score)
}
