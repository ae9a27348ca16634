use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::planner::PlanningOutcome;
use crate::domain::entities::plan_view::PlanView;
use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::ports::recommendation_repository::{PendingCounts, RecommendationRepository};
use crate::domain::values::trade_side::TradeSide;

/// Result of reporting a failed execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetryOutcome {
    WillRetry { attempts: i64 },
    GaveUp { attempts: i64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GarbageCollection {
    pub recommendations_deleted: usize,
    pub audit_entries_pruned: usize,
}

pub struct RecommendationsUseCase {
    repo: Arc<dyn RecommendationRepository>,
    max_retries: i64,
}

impl RecommendationsUseCase {
    pub fn new(repo: Arc<dyn RecommendationRepository>, max_retries: i64) -> Self {
        Self { repo, max_retries }
    }

    /// Persists a planning run: the plan replaces whatever was pending and the
    /// audit trail is stored under the run's portfolio hash.
    pub fn store_outcome(&self, outcome: &PlanningOutcome) -> Result<usize, DomainError> {
        let hash = outcome.portfolio_hash.as_str();
        self.repo
            .store_rejected_opportunities(hash, outcome.rejected_opportunities.clone())?;
        self.repo
            .store_pre_filtered_securities(hash, outcome.pre_filtered_securities.clone())?;
        self.repo
            .store_rejected_sequences(hash, outcome.rejected_sequences.clone())?;
        self.repo.store_evaluated_count(hash, outcome.evaluated_count)?;
        self.repo.store_plan(&outcome.plan, hash)
    }

    pub fn plan_view(&self, starting_cash_eur: f64) -> Result<PlanView, DomainError> {
        let repo = Arc::clone(&self.repo);
        let lookup = move |hash: &str| -> Result<usize, DomainError> {
            Ok(repo.get_evaluated_count(hash)?.unwrap_or(0))
        };
        self.repo.get_recommendations_as_plan(Some(&lookup), starting_cash_eur)
    }

    pub fn pending(&self, limit: i64) -> Result<Vec<Recommendation>, DomainError> {
        self.repo.get_pending_recommendations(limit)
    }

    pub fn counts(&self) -> Result<PendingCounts, DomainError> {
        self.repo.count_pending_by_side()
    }

    pub fn get(&self, uuid: &str) -> Result<Recommendation, DomainError> {
        self.repo
            .get_recommendation(uuid)?
            .ok_or_else(|| DomainError::NotFound(format!("recommendation {uuid}")))
    }

    /// Marks every pending match executed. Returns how many were updated.
    pub fn record_execution(&self, symbol: &str, side: TradeSide, portfolio_hash: &str) -> Result<usize, DomainError> {
        let matches = self.repo.find_matching_for_execution(symbol, side, portfolio_hash)?;
        for rec in &matches {
            self.repo.mark_executed(&rec.uuid)?;
        }
        info!(symbol, %side, executed = matches.len(), "Recorded execution");
        Ok(matches.len())
    }

    pub fn record_failure(&self, uuid: &str, reason: &str) -> Result<RetryOutcome, DomainError> {
        let rec = self.get(uuid)?;
        if !rec.is_pending() {
            return Err(DomainError::InvalidInput(format!(
                "recommendation {uuid} is {}, not pending",
                rec.status
            )));
        }
        self.repo.record_failed_attempt(uuid, reason)?;
        let attempts = rec.retry_count + 1;
        if attempts < self.max_retries {
            return Ok(RetryOutcome::WillRetry { attempts });
        }
        if let Err(e) = self.repo.mark_failed(uuid, reason) {
            warn!(uuid, error = %e, "Failed to mark recommendation as failed");
        }
        Ok(RetryOutcome::GaveUp { attempts })
    }

    pub fn dismiss(&self, portfolio_hash: Option<&str>) -> Result<usize, DomainError> {
        match portfolio_hash {
            Some(hash) => self.repo.dismiss_all_by_portfolio_hash(hash),
            None => self.repo.dismiss_all_pending(),
        }
    }

    /// Applies one retention window to recommendations and audit data alike.
    pub fn collect_garbage(&self, max_age: Duration) -> Result<GarbageCollection, DomainError> {
        let gc = GarbageCollection {
            recommendations_deleted: self.repo.delete_older_than(max_age)?,
            audit_entries_pruned: self.repo.prune_audit_older_than(max_age)?,
        };
        info!(
            deleted = gc.recommendations_deleted,
            pruned = gc.audit_entries_pruned,
            "Garbage collection complete"
        );
        Ok(gc)
    }
}
