//! Recommendation store port.
//!
//! Two backends implement this trait (in-memory and sqlite). Plan storage and
//! plan-view reconstruction are written once here on top of the primitive
//! operations, so both backends behave identically.

use chrono::Duration;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::entities::plan::HolisticPlan;
use crate::domain::entities::plan_view::{PlanView, PlanViewStep};
use crate::domain::entities::recommendation::{Recommendation, RecommendationDraft};
use crate::domain::error::DomainError;
use crate::domain::values::audit::{PreFilteredSecurity, RejectedOpportunity, RejectedSequence};
use crate::domain::values::trade_side::TradeSide;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub buy: usize,
    pub sell: usize,
}

/// Looks up how many sequences were evaluated for a portfolio hash.
pub type EvaluatedCountFn<'a> = &'a dyn Fn(&str) -> Result<usize, DomainError>;

pub trait RecommendationRepository: Send + Sync {
    /// Updates the pending record matching (symbol, side, reason, portfolio hash)
    /// in place, or inserts a new pending one. Returns its UUID.
    fn create_or_update(&self, draft: RecommendationDraft) -> Result<String, DomainError>;
    fn get_recommendation(&self, uuid: &str) -> Result<Option<Recommendation>, DomainError>;
    fn find_matching_for_execution(
        &self,
        symbol: &str,
        side: TradeSide,
        portfolio_hash: &str,
    ) -> Result<Vec<Recommendation>, DomainError>;
    fn mark_executed(&self, uuid: &str) -> Result<(), DomainError>;
    fn record_failed_attempt(&self, uuid: &str, reason: &str) -> Result<(), DomainError>;
    fn mark_failed(&self, uuid: &str, reason: &str) -> Result<(), DomainError>;
    fn dismiss_all_pending(&self) -> Result<usize, DomainError>;
    fn dismiss_all_by_portfolio_hash(&self, portfolio_hash: &str) -> Result<usize, DomainError>;
    /// Pending records by priority, then creation time. `limit <= 0` is unbounded.
    fn get_pending_recommendations(&self, limit: i64) -> Result<Vec<Recommendation>, DomainError>;
    fn count_pending_by_side(&self) -> Result<PendingCounts, DomainError>;
    /// Deletes records of any status created before `now - max_age`.
    fn delete_older_than(&self, max_age: Duration) -> Result<usize, DomainError>;

    fn store_rejected_opportunities(
        &self,
        portfolio_hash: &str,
        rejected: Vec<RejectedOpportunity>,
    ) -> Result<(), DomainError>;
    fn get_rejected_opportunities(&self, portfolio_hash: &str) -> Result<Vec<RejectedOpportunity>, DomainError>;
    fn store_pre_filtered_securities(
        &self,
        portfolio_hash: &str,
        pre_filtered: Vec<PreFilteredSecurity>,
    ) -> Result<(), DomainError>;
    fn get_pre_filtered_securities(&self, portfolio_hash: &str) -> Result<Vec<PreFilteredSecurity>, DomainError>;
    fn store_rejected_sequences(
        &self,
        portfolio_hash: &str,
        rejected: Vec<RejectedSequence>,
    ) -> Result<(), DomainError>;
    fn get_rejected_sequences(&self, portfolio_hash: &str) -> Result<Vec<RejectedSequence>, DomainError>;
    fn store_evaluated_count(&self, portfolio_hash: &str, count: usize) -> Result<(), DomainError>;
    fn get_evaluated_count(&self, portfolio_hash: &str) -> Result<Option<usize>, DomainError>;
    /// Drops audit entries stored before `now - max_age`.
    fn prune_audit_older_than(&self, max_age: Duration) -> Result<usize, DomainError>;
    /// Portfolio hash of the most recently written audit entry.
    fn latest_audit_hash(&self) -> Result<Option<String>, DomainError>;

    /// Replaces the pending plan: dismisses everything pending, then inserts one
    /// recommendation per step with `priority` equal to the step index.
    fn store_plan(&self, plan: &HolisticPlan, portfolio_hash: &str) -> Result<usize, DomainError> {
        log_dismissal(self.dismiss_all_pending());
        for (idx, draft) in plan_drafts(plan, portfolio_hash).into_iter().enumerate() {
            self.create_or_update(draft).map_err(|e| step_error(idx, e))?;
        }
        log_stored(plan, portfolio_hash);
        Ok(plan.steps.len())
    }

    /// Rebuilds the UI plan view from pending recommendations, walking them in
    /// priority order with a running cash balance.
    fn get_recommendations_as_plan(
        &self,
        evaluated_count: Option<EvaluatedCountFn<'_>>,
        starting_cash_eur: f64,
    ) -> Result<PlanView, DomainError> {
        let recs = self.get_pending_recommendations(0)?;

        let mut cash = starting_cash_eur;
        let mut steps = Vec::with_capacity(recs.len());
        for (i, rec) in recs.iter().enumerate() {
            let step = if rec.priority >= 0.0 {
                rec.priority as usize + 1
            } else {
                i + 1
            };
            let before = cash;
            match rec.side {
                TradeSide::Buy => cash -= rec.estimated_value,
                TradeSide::Sell => cash += rec.estimated_value,
            }
            steps.push(PlanViewStep {
                step,
                uuid: rec.uuid.clone(),
                symbol: rec.symbol.clone(),
                name: rec.name.clone(),
                side: rec.side,
                quantity: rec.quantity,
                estimated_price: (rec.estimated_price * 100.0).round() / 100.0,
                estimated_value: rec.estimated_value,
                currency: rec.currency.clone(),
                reason: rec.reason.clone(),
                portfolio_score_before: rec.current_portfolio_score,
                portfolio_score_after: rec.new_portfolio_score,
                score_change: rec.score_change,
                available_cash_before: before,
                available_cash_after: cash,
                is_emergency: rec.is_emergency(),
            });
        }

        let (current_score, end_state_score) = match (recs.first(), recs.last()) {
            (Some(first), Some(last)) => (first.current_portfolio_score, last.new_portfolio_score),
            _ => (0.0, 0.0),
        };

        // A hold run stores no recommendations but still leaves an audit trail.
        let portfolio_hash = match recs.first() {
            Some(first) => first.portfolio_hash.clone(),
            None => match self.latest_audit_hash()? {
                Some(hash) => hash,
                None => {
                    return Ok(PlanView {
                        final_available_cash: starting_cash_eur,
                        ..PlanView::default()
                    })
                }
            },
        };

        let evaluated_count = match evaluated_count {
            Some(lookup) if !portfolio_hash.is_empty() => match lookup(&portfolio_hash) {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!(error = %e, portfolio_hash = %portfolio_hash, "Failed to get evaluated count");
                    None
                }
            },
            _ => None,
        };

        let rejected_opportunities = self.get_rejected_opportunities(&portfolio_hash)?;
        let pre_filtered_securities = self.get_pre_filtered_securities(&portfolio_hash)?;
        let rejected_sequences = self.get_rejected_sequences(&portfolio_hash)?;

        Ok(PlanView {
            steps,
            current_score,
            end_state_score,
            total_score_improvement: end_state_score - current_score,
            final_available_cash: cash,
            evaluated_count,
            rejected_opportunities: non_empty(rejected_opportunities),
            pre_filtered_securities: non_empty(pre_filtered_securities),
            rejected_sequences: non_empty(rejected_sequences),
            portfolio_hash: Some(portfolio_hash),
        })
    }
}

/// One pending draft per plan step, prioritised by step index.
pub fn plan_drafts(plan: &HolisticPlan, portfolio_hash: &str) -> Vec<RecommendationDraft> {
    plan.steps
        .iter()
        .enumerate()
        .map(|(idx, step)| RecommendationDraft {
            symbol: step.symbol.clone(),
            name: step.name.clone(),
            side: step.side,
            quantity: step.quantity,
            estimated_price: step.estimated_price,
            estimated_value: step.estimated_value,
            reason: step.reason.clone(),
            currency: step.currency.clone(),
            priority: idx as f64,
            current_portfolio_score: step.portfolio_score_before,
            new_portfolio_score: step.portfolio_score_after,
            portfolio_hash: portfolio_hash.to_string(),
        })
        .collect()
}

/// Dismissal ahead of a plan write is best-effort.
pub fn log_dismissal(result: Result<usize, DomainError>) {
    match result {
        Ok(0) => {}
        Ok(n) => info!(dismissed = n, "Dismissed previous pending recommendations"),
        Err(e) => warn!(error = %e, "Failed to dismiss pending recommendations before storing plan"),
    }
}

pub fn log_stored(plan: &HolisticPlan, portfolio_hash: &str) {
    if !plan.steps.is_empty() {
        info!(steps = plan.steps.len(), portfolio_hash, "Stored plan as recommendations");
    }
}

pub fn step_error(idx: usize, e: DomainError) -> DomainError {
    match e {
        DomainError::Database(msg) => DomainError::Database(format!("Failed to store plan step {}: {msg}", idx + 1)),
        other => other,
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
