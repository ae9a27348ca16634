//! Parallel batch evaluation on a dedicated rayon pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::error::DomainError;
use crate::domain::ports::progress::{emit, ProgressReporter};
use crate::domain::values::action::ActionSequence;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::evaluation::EvaluationResult;
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::progress::{ProgressDetails, ProgressPhase, ProgressUpdate};

use super::simulation::EvaluationContext;
use super::evaluate_sequence;

const MIN_WORKERS: usize = 2;
const PROGRESS_EVERY: usize = 50;

pub struct EvaluationService {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl EvaluationService {
    /// Builds the worker pool. `None` sizes it to the available parallelism;
    /// either way at least two workers are started.
    pub fn new(workers: Option<usize>) -> Result<Self, DomainError> {
        let workers = workers
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(MIN_WORKERS)
            })
            .max(MIN_WORKERS);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("planner-eval-{i}"))
            .build()
            .map_err(|e| DomainError::Evaluation(format!("Failed to build worker pool: {}", e)))?;
        Ok(Self { pool, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn batch_evaluate(
        &self,
        cancel: &CancellationToken,
        sequences: &[ActionSequence],
        portfolio_hash: &str,
        config: &PlannerConfiguration,
        opportunity_ctx: &OpportunityContext,
    ) -> Result<Vec<EvaluationResult>, DomainError> {
        self.batch_evaluate_with_progress(cancel, sequences, portfolio_hash, config, opportunity_ctx, None)
    }

    /// Evaluates every sequence and returns one result per input, in input
    /// order. Once `cancel` fires no further sequences are started and the
    /// batch fails with [`DomainError::Cancelled`].
    pub fn batch_evaluate_with_progress(
        &self,
        cancel: &CancellationToken,
        sequences: &[ActionSequence],
        portfolio_hash: &str,
        config: &PlannerConfiguration,
        opportunity_ctx: &OpportunityContext,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<Vec<EvaluationResult>, DomainError> {
        if sequences.is_empty() {
            return Err(DomainError::InvalidInput("no sequences to evaluate".to_string()));
        }
        let ctx = EvaluationContext::new(opportunity_ctx, config);
        self.evaluate_in_context(cancel, &ctx, sequences, portfolio_hash, progress)
    }

    /// Same as [`Self::batch_evaluate_with_progress`] against an already
    /// derived context.
    pub fn evaluate_in_context(
        &self,
        cancel: &CancellationToken,
        ctx: &EvaluationContext,
        sequences: &[ActionSequence],
        portfolio_hash: &str,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<Vec<EvaluationResult>, DomainError> {
        if sequences.is_empty() {
            return Err(DomainError::InvalidInput("no sequences to evaluate".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        let total = sequences.len();
        let done = AtomicUsize::new(0);
        let started = Instant::now();

        info!(
            sequences = total,
            workers = self.workers,
            portfolio_hash = %portfolio_hash,
            "Evaluating sequences"
        );

        let results: Vec<Option<EvaluationResult>> = self.pool.install(|| {
            sequences
                .par_iter()
                .map(|sequence| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let result = evaluate_sequence(ctx, sequence, portfolio_hash);
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if n % PROGRESS_EVERY == 0 || n == total {
                        let elapsed = started.elapsed().as_secs_f64();
                        emit(
                            progress,
                            ProgressUpdate::new(
                                ProgressPhase::SequenceEvaluation,
                                "batch",
                                n,
                                total,
                                format!("Evaluated {n}/{total} sequences"),
                            )
                            .with_details(ProgressDetails {
                                sequences_count: Some(total),
                                sequences_per_second: (elapsed > 0.0).then(|| n as f64 / elapsed),
                                ..ProgressDetails::default()
                            }),
                        );
                    }
                    Some(result)
                })
                .collect()
        });

        let results: Vec<EvaluationResult> = match results.into_iter().collect::<Option<Vec<_>>>() {
            Some(results) => results,
            None => {
                debug!(completed = done.load(Ordering::Relaxed), total, "Evaluation cancelled");
                return Err(DomainError::Cancelled);
            }
        };

        let feasible = results.iter().filter(|r| r.feasible).count();
        info!(
            evaluated = results.len(),
            feasible,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Evaluation complete"
        );
        Ok(results)
    }
}
