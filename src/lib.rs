pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

use crate::application::evaluation::EvaluationService;
use crate::application::planner::{Planner, PlanningOutcome};
use crate::application::recommendations::{GarbageCollection, RecommendationsUseCase, RetryOutcome};
use crate::domain::entities::plan_view::PlanView;
use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::progress::ProgressReporter;
use crate::domain::ports::recommendation_repository::{PendingCounts, RecommendationRepository};
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::trade_side::TradeSide;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::memory::recommendation_repo::InMemoryRecommendationRepo;
use crate::infrastructure::settings::PlannerSettings;
use crate::infrastructure::sqlite::migrations::run_migrations;
use crate::infrastructure::sqlite::recommendation_repo::SqliteRecommendationRepo;
use chrono::Duration;
use rusqlite::Connection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct HolisticPlanner {
    planner: Planner,
    recommendations_uc: RecommendationsUseCase,
}

impl HolisticPlanner {
    /// Opens the backend named by `settings.db_path`; `:memory:` selects the
    /// map-backed store.
    pub fn new(settings: &PlannerSettings) -> Result<Self, DomainError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let repo: Arc<dyn RecommendationRepository> = if settings.is_in_memory() {
            Arc::new(InMemoryRecommendationRepo::new(clock, settings.audit_capacity))
        } else {
            Arc::new(open_sqlite(&settings.db_path, clock, settings.audit_capacity)?)
        };
        Self::with_repository(repo, settings)
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        Self::new(&PlannerSettings::in_memory())
    }

    pub fn with_repository(
        repo: Arc<dyn RecommendationRepository>,
        settings: &PlannerSettings,
    ) -> Result<Self, DomainError> {
        let evaluator = EvaluationService::new(settings.workers)?;
        Ok(Self {
            planner: Planner::new(evaluator),
            recommendations_uc: RecommendationsUseCase::new(repo, settings.max_retries),
        })
    }

    /// Runs the planner without persisting anything.
    pub fn create_plan(
        &self,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
        cancel: &CancellationToken,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<PlanningOutcome, DomainError> {
        self.planner.create_plan(ctx, config, cancel, progress)
    }

    /// Runs the planner and replaces the pending recommendations with the new
    /// plan. A failed run leaves the stored plan untouched.
    pub fn plan(
        &self,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
        cancel: &CancellationToken,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<PlanningOutcome, DomainError> {
        let outcome = self.planner.create_plan(ctx, config, cancel, progress)?;
        self.recommendations_uc.store_outcome(&outcome)?;
        Ok(outcome)
    }

    pub fn evaluation_workers(&self) -> usize {
        self.planner.evaluator().workers()
    }

    // Delegating methods
    pub fn plan_view(&self, starting_cash_eur: f64) -> Result<PlanView, DomainError> {
        self.recommendations_uc.plan_view(starting_cash_eur)
    }

    pub fn pending(&self, limit: i64) -> Result<Vec<Recommendation>, DomainError> {
        self.recommendations_uc.pending(limit)
    }

    pub fn counts(&self) -> Result<PendingCounts, DomainError> {
        self.recommendations_uc.counts()
    }

    pub fn recommendation(&self, uuid: &str) -> Result<Recommendation, DomainError> {
        self.recommendations_uc.get(uuid)
    }

    pub fn record_execution(&self, symbol: &str, side: TradeSide, portfolio_hash: &str) -> Result<usize, DomainError> {
        self.recommendations_uc.record_execution(symbol, side, portfolio_hash)
    }

    pub fn record_failure(&self, uuid: &str, reason: &str) -> Result<RetryOutcome, DomainError> {
        self.recommendations_uc.record_failure(uuid, reason)
    }

    pub fn dismiss(&self, portfolio_hash: Option<&str>) -> Result<usize, DomainError> {
        self.recommendations_uc.dismiss(portfolio_hash)
    }

    pub fn collect_garbage(&self, max_age: Duration) -> Result<GarbageCollection, DomainError> {
        self.recommendations_uc.collect_garbage(max_age)
    }
}

/// Opens (and migrates) a sqlite recommendation store at `db_path`.
pub fn open_sqlite(
    db_path: &str,
    clock: Arc<dyn Clock>,
    audit_capacity: usize,
) -> Result<SqliteRecommendationRepo, DomainError> {
    let conn = Connection::open(db_path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
    run_migrations(&conn)?;
    Ok(SqliteRecommendationRepo::new(conn, clock, audit_capacity))
}
