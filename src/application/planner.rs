//! Planning run orchestration: pools, patterns, expansion, filtering,
//! evaluation, selection and plan assembly.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::evaluation::{EvaluationContext, EvaluationService};
use crate::application::expander::{self, Expansion, ExpansionStats};
use crate::application::filters::{self, PreFilterOutcome};
use crate::application::patterns;
use crate::application::plan_assembler;
use crate::application::selector::{self, Selection};
use crate::domain::entities::plan::HolisticPlan;
use crate::domain::error::DomainError;
use crate::domain::ports::filter::{OpportunityFilter, SequenceFilter};
use crate::domain::ports::pattern_generator::{CandidatePools, GenerationContext, PatternGenerator};
use crate::domain::ports::progress::{emit, ProgressReporter};
use crate::domain::values::action::ActionSequence;
use crate::domain::values::audit::{PreFilteredSecurity, RejectedOpportunity, RejectedSequence};
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::portfolio_hash::portfolio_hash;
use crate::domain::values::progress::{ProgressDetails, ProgressPhase, ProgressUpdate};
use crate::domain::values::trade_side::TradeSide;

const NOT_GENERATED: &str = "not selected by sequence generator";
const NOT_EVALUATED: &str = "sequence not in top candidates";

#[derive(Debug, Clone, Serialize)]
pub struct PlanningOutcome {
    pub plan: HolisticPlan,
    pub portfolio_hash: String,
    pub evaluated_count: usize,
    pub stats: ExpansionStats,
    pub rejected_opportunities: Vec<RejectedOpportunity>,
    pub pre_filtered_securities: Vec<PreFilteredSecurity>,
    pub rejected_sequences: Vec<RejectedSequence>,
}

pub struct Planner {
    patterns: Vec<Box<dyn PatternGenerator>>,
    opportunity_filters: Vec<Box<dyn OpportunityFilter>>,
    sequence_filters: Vec<Box<dyn SequenceFilter>>,
    evaluator: EvaluationService,
}

impl Planner {
    /// Planner with every built-in pattern and filter.
    pub fn new(evaluator: EvaluationService) -> Self {
        Self {
            patterns: patterns::all_patterns(),
            opportunity_filters: filters::default_opportunity_filters(),
            sequence_filters: filters::default_sequence_filters(),
            evaluator,
        }
    }

    pub fn evaluator(&self) -> &EvaluationService {
        &self.evaluator
    }

    pub fn create_plan(
        &self,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
        cancel: &CancellationToken,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<PlanningOutcome, DomainError> {
        config.validate()?;
        let started = Instant::now();
        let hash = portfolio_hash(ctx);

        emit(
            progress,
            ProgressUpdate::new(
                ProgressPhase::OpportunityIdentification,
                "pre_filtering",
                0,
                ctx.opportunities.len(),
                "Filtering opportunities",
            ),
        );
        let PreFilterOutcome { pools, pre_filtered } =
            filters::build_candidate_pools(ctx, config, &self.opportunity_filters);
        emit(
            progress,
            ProgressUpdate::new(
                ProgressPhase::OpportunityIdentification,
                "pools",
                ctx.opportunities.len(),
                ctx.opportunities.len(),
                format!("{} candidates in pools", pools.len()),
            )
            .with_details(ProgressDetails {
                candidates_count: Some(pools.len()),
                pre_filtered_count: Some(pre_filtered.len()),
                ..ProgressDetails::default()
            }),
        );
        check_cancelled(cancel)?;

        let expansion = self.generate(ctx, config, &pools, progress)?;
        let Expansion {
            sequences,
            stats,
            seen_keys,
        } = expansion;
        let sequences = filters::apply_sequence_filters(sequences, ctx, config, &self.sequence_filters);
        emit(
            progress,
            ProgressUpdate::new(
                ProgressPhase::SequenceGeneration,
                "filtering",
                sequences.len(),
                sequences.len(),
                format!("{} sequences after filtering", sequences.len()),
            )
            .with_details(ProgressDetails {
                sequences_count: Some(sequences.len()),
                ..ProgressDetails::default()
            }),
        );
        check_cancelled(cancel)?;

        let eval_ctx = EvaluationContext::new(ctx, config);
        if sequences.is_empty() {
            info!(portfolio_hash = %hash, "No candidate sequences, holding");
            let rejected_opportunities = rejected_opportunities(&pools, None, &[], |key| seen_keys.contains(key));
            return Ok(PlanningOutcome {
                plan: HolisticPlan::hold(eval_ctx.start_score),
                portfolio_hash: hash,
                evaluated_count: 0,
                stats,
                rejected_opportunities,
                pre_filtered_securities: pre_filtered,
                rejected_sequences: Vec::new(),
            });
        }

        let results = self
            .evaluator
            .evaluate_in_context(cancel, &eval_ctx, &sequences, &hash, progress)?;

        let Selection { winner, rejected } = selector::select(&sequences, &results, config)?;
        let feasible = results.iter().filter(|r| r.feasible).count();
        emit(
            progress,
            ProgressUpdate::new(
                ProgressPhase::SequenceSelection,
                "ranking",
                results.len(),
                results.len(),
                "Selected best sequence",
            )
            .with_details(ProgressDetails {
                sequences_count: Some(results.len()),
                feasible_count: Some(feasible),
                infeasible_count: Some(results.len() - feasible),
                best_score: winner.map(|(_, r)| r.end_score),
                ..ProgressDetails::default()
            }),
        );

        let plan = match winner {
            Some((sequence, result)) => plan_assembler::assemble(sequence, result, &eval_ctx),
            None => HolisticPlan::hold(eval_ctx.start_score),
        };
        let rejected_opportunities =
            rejected_opportunities(&pools, winner.map(|(s, _)| s), &rejected, |key| seen_keys.contains(key));

        info!(
            portfolio_hash = %hash,
            evaluated = results.len(),
            feasible,
            steps = plan.steps.len(),
            end_score = plan.end_state_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Planning complete"
        );

        Ok(PlanningOutcome {
            plan,
            portfolio_hash: hash,
            evaluated_count: results.len(),
            stats,
            rejected_opportunities,
            pre_filtered_securities: pre_filtered,
            rejected_sequences: rejected,
        })
    }

    fn generate(
        &self,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
        pools: &CandidatePools,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<Expansion, DomainError> {
        let gen_ctx = GenerationContext { snapshot: ctx, pools };
        let enabled: Vec<&dyn PatternGenerator> = self
            .patterns
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| config.patterns.is_enabled(p.name()))
            .collect();

        let mut seeds = Vec::new();
        for (idx, pattern) in enabled.iter().enumerate() {
            let produced = pattern.generate(&gen_ctx, config)?;
            debug!(pattern = pattern.name(), sequences = produced.len(), "Pattern generated");
            seeds.extend(produced);
            emit(
                progress,
                ProgressUpdate::new(
                    ProgressPhase::SequenceGeneration,
                    pattern.name(),
                    idx + 1,
                    enabled.len(),
                    format!("Pattern {} done", pattern.name()),
                )
                .with_details(ProgressDetails {
                    sequences_count: Some(seeds.len()),
                    ..ProgressDetails::default()
                }),
            );
        }

        let expansion = expander::expand(seeds, pools, gen_ctx.available_cash(), config);
        debug!(stats = ?expansion.stats, "Expansion complete");
        emit(
            progress,
            ProgressUpdate::new(
                ProgressPhase::SequenceGeneration,
                "expansion",
                expansion.sequences.len(),
                expansion.stats.generated,
                format!("{} unique sequences", expansion.sequences.len()),
            )
            .with_details(ProgressDetails {
                sequences_count: Some(expansion.sequences.len()),
                ..ProgressDetails::default()
            }),
        );
        Ok(expansion)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), DomainError> {
    if cancel.is_cancelled() {
        return Err(DomainError::Cancelled);
    }
    Ok(())
}

/// One entry per pooled candidate that did not make it into the plan.
fn rejected_opportunities(
    pools: &CandidatePools,
    winner: Option<&ActionSequence>,
    rejected: &[RejectedSequence],
    was_generated: impl Fn(&(String, TradeSide)) -> bool,
) -> Vec<RejectedOpportunity> {
    let mut out: BTreeMap<(String, TradeSide), RejectedOpportunity> = BTreeMap::new();

    for candidate in pools.all() {
        let key = candidate.key();
        if winner.is_some_and(|w| w.contains(&candidate.symbol, candidate.side)) {
            continue;
        }
        let reason = if !was_generated(&key) {
            NOT_GENERATED.to_string()
        } else if let Some(rank) = rejected
            .iter()
            .filter(|r| r.actions.iter().any(|a| a.symbol == candidate.symbol && a.side == candidate.side))
            .map(|r| r.rank)
            .min()
        {
            format!("in alternative sequence ranked #{rank}")
        } else {
            NOT_EVALUATED.to_string()
        };

        let entry = out.entry(key).or_insert_with(|| RejectedOpportunity {
            side: candidate.side,
            symbol: candidate.symbol.clone(),
            name: candidate.name.clone(),
            original_reason: candidate.reason.clone(),
            reasons: Vec::new(),
        });
        entry.reasons.push(reason);
        entry.reasons.sort();
        entry.reasons.dedup();
    }

    out.into_values().collect()
}
