//! Shared test helpers.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use holistic_planner::domain::entities::plan::{HolisticPlan, PlanStep};
use holistic_planner::domain::entities::recommendation::RecommendationDraft;
use holistic_planner::domain::ports::clock::Clock;
use holistic_planner::domain::ports::recommendation_repository::RecommendationRepository;
use holistic_planner::domain::values::context::{OpportunityContext, Position, Security};
use holistic_planner::domain::values::opportunity::{Opportunity, OpportunityCategory};
use holistic_planner::domain::values::trade_side::TradeSide;
use holistic_planner::infrastructure::clock::ManualClock;
use holistic_planner::infrastructure::memory::recommendation_repo::InMemoryRecommendationRepo;
use holistic_planner::open_sqlite;
use holistic_planner::HolisticPlanner;
use std::sync::Arc;
use tempfile::TempDir;

pub const AUDIT_CAPACITY: usize = 4;

pub fn setup() -> HolisticPlanner {
    HolisticPlanner::in_memory().unwrap()
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

/// One store under test. Keeps the temp directory alive for file-backed sqlite.
pub struct Backend {
    pub name: &'static str,
    pub repo: Arc<dyn RecommendationRepository>,
    pub clock: Arc<ManualClock>,
    _dir: Option<TempDir>,
}

/// The same contract runs against every backend.
pub fn backends() -> Vec<Backend> {
    let mut out = Vec::new();

    let clock = Arc::new(ManualClock::new(t0()));
    out.push(Backend {
        name: "memory",
        repo: Arc::new(InMemoryRecommendationRepo::new(
            clock.clone() as Arc<dyn Clock>,
            AUDIT_CAPACITY,
        )),
        clock,
        _dir: None,
    });

    let clock = Arc::new(ManualClock::new(t0()));
    out.push(Backend {
        name: "sqlite-memory",
        repo: Arc::new(open_sqlite(":memory:", clock.clone() as Arc<dyn Clock>, AUDIT_CAPACITY).unwrap()),
        clock,
        _dir: None,
    });

    let clock = Arc::new(ManualClock::new(t0()));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("planner.db");
    out.push(Backend {
        name: "sqlite-file",
        repo: Arc::new(
            open_sqlite(path.to_str().unwrap(), clock.clone() as Arc<dyn Clock>, AUDIT_CAPACITY).unwrap(),
        ),
        clock,
        _dir: Some(dir),
    });

    out
}

pub fn draft(symbol: &str, side: TradeSide, reason: &str, hash: &str, priority: f64) -> RecommendationDraft {
    RecommendationDraft {
        symbol: symbol.to_string(),
        name: format!("{symbol} Corp"),
        side,
        quantity: 10,
        estimated_price: 100.0,
        estimated_value: 1000.0,
        reason: reason.to_string(),
        currency: "EUR".to_string(),
        priority,
        current_portfolio_score: 0.5,
        new_portfolio_score: 0.6,
        portfolio_hash: hash.to_string(),
    }
}

pub fn step(
    n: usize,
    side: TradeSide,
    symbol: &str,
    quantity: i64,
    price: f64,
    score_before: f64,
    score_after: f64,
) -> PlanStep {
    PlanStep {
        step_number: n,
        side,
        isin: format!("ISIN-{symbol}"),
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        quantity,
        estimated_price: price,
        estimated_value: quantity as f64 * price,
        currency: "EUR".to_string(),
        reason: format!("step {n}"),
        narrative: format!("Step {n}: {side} {quantity} shares of {symbol}"),
        is_windfall: false,
        is_averaging_down: false,
        portfolio_score_before: score_before,
        portfolio_score_after: score_after,
        cash_before: 0.0,
        cash_after: 0.0,
    }
}

pub fn plan(steps: Vec<PlanStep>) -> HolisticPlan {
    let current = steps.first().map(|s| s.portfolio_score_before).unwrap_or(0.5);
    let end = steps.last().map(|s| s.portfolio_score_after).unwrap_or(current);
    HolisticPlan {
        steps,
        current_score: current,
        end_state_score: end,
        improvement: end - current,
        narrative_summary: String::new(),
        cash_required: 0.0,
        cash_generated: 0.0,
        feasible: true,
        pattern: None,
        sequence_hash: None,
    }
}

pub fn security(isin: &str, symbol: &str, country: &str, industry: &str) -> Security {
    Security {
        isin: isin.to_string(),
        symbol: symbol.to_string(),
        name: format!("{symbol} Corp"),
        currency: "EUR".to_string(),
        country: country.to_string(),
        industry: industry.to_string(),
        allow_buy: true,
        allow_sell: true,
        quality_score: Some(0.7),
        dividend_yield: Some(0.02),
    }
}

pub fn position(isin: &str, symbol: &str, quantity: f64, avg_cost: f64, price: f64) -> Position {
    Position {
        isin: isin.to_string(),
        symbol: symbol.to_string(),
        quantity,
        avg_cost,
        current_price: price,
        market_value_eur: quantity * price,
        first_bought_at: None,
    }
}

pub fn opportunity(
    category: OpportunityCategory,
    side: TradeSide,
    isin: &str,
    symbol: &str,
    quantity: i64,
    price: f64,
    priority: f64,
) -> Opportunity {
    Opportunity {
        category,
        side,
        isin: isin.to_string(),
        symbol: symbol.to_string(),
        name: format!("{symbol} Corp"),
        quantity,
        price,
        currency: "EUR".to_string(),
        eur_rate: 1.0,
        reason: format!("{category} {symbol}"),
        tags: Vec::new(),
        priority,
    }
}

/// Three-security portfolio holding AAA with 1000 EUR cash and one
/// opportunity per calculator family.
pub fn sample_context() -> OpportunityContext {
    let mut ctx = OpportunityContext::new(t0(), 1000.0);
    ctx.securities = vec![
        security("IE000AAA0001", "AAA", "US", "Technology"),
        security("DE000BBB0002", "BBB", "DE", "Industrials"),
        security("FR000CCC0003", "CCC", "FR", "Consumer"),
    ];
    ctx.positions = vec![position("IE000AAA0001", "AAA", 10.0, 100.0, 150.0)];
    ctx.total_portfolio_value_eur = 2500.0;

    let mut windfall = opportunity(
        OpportunityCategory::ProfitTaking,
        TradeSide::Sell,
        "IE000AAA0001",
        "AAA",
        3,
        150.0,
        0.8,
    );
    windfall.tags = vec!["windfall".to_string()];
    ctx.opportunities = vec![
        windfall,
        opportunity(
            OpportunityCategory::OpportunityBuys,
            TradeSide::Buy,
            "DE000BBB0002",
            "BBB",
            4,
            100.0,
            0.7,
        ),
        opportunity(
            OpportunityCategory::RebalanceBuys,
            TradeSide::Buy,
            "FR000CCC0003",
            "CCC",
            2,
            200.0,
            0.6,
        ),
    ];

    ctx.country_weights = [("US", 0.4), ("DE", 0.3), ("FR", 0.3)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    ctx.target_weights = [("IE000AAA0001", 0.4), ("DE000BBB0002", 0.3), ("FR000CCC0003", 0.3)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    for (isin, cagr, vol, sharpe, dd) in [
        ("IE000AAA0001", 0.12, 0.22, 1.1, -0.25),
        ("DE000BBB0002", 0.09, 0.18, 0.9, -0.18),
        ("FR000CCC0003", 0.10, 0.20, 1.0, -0.20),
    ] {
        ctx.cagrs.insert(isin.to_string(), cagr);
        ctx.volatility.insert(isin.to_string(), vol);
        ctx.sharpe.insert(isin.to_string(), sharpe);
        ctx.max_drawdown.insert(isin.to_string(), dd);
    }
    ctx
}
