//! Portfolio simulation.
//!
//! [`EvaluationContext`] is derived once per batch from the planning snapshot
//! and is never mutated afterwards; every simulation works on its own copy of
//! the starting state.

use std::collections::{BTreeMap, HashMap};

use crate::domain::values::action::ActionCandidate;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::evaluation::InfeasibilityReason;
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::trade_side::TradeSide;

use super::scoring;

const EPSILON: f64 = 1e-9;

/// Market value per ISIN plus free cash, all in EUR.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioState {
    pub positions: BTreeMap<String, f64>,
    pub cash: f64,
}

impl PortfolioState {
    pub fn invested(&self) -> f64 {
        self.positions.values().sum()
    }

    pub fn total_value(&self) -> f64 {
        self.invested() + self.cash
    }
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    quantity: f64,
    avg_cost: f64,
}

/// Per-security inputs to scoring, keyed by ISIN.
#[derive(Debug, Clone, Default)]
pub struct SecurityMetrics {
    pub cagr: BTreeMap<String, f64>,
    pub volatility: BTreeMap<String, f64>,
    pub sharpe: BTreeMap<String, f64>,
    pub max_drawdown: BTreeMap<String, f64>,
    pub quality: BTreeMap<String, f64>,
    pub dividend: BTreeMap<String, f64>,
    pub country: BTreeMap<String, String>,
    pub industry: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    pub fixed: f64,
    pub percent: f64,
    pub penalty_factor: f64,
}

impl CostModel {
    /// `fixed × n + percent × Σ|value|`.
    pub fn transaction_cost(&self, actions: &[ActionCandidate]) -> f64 {
        let variable: f64 = actions.iter().map(|a| a.value_eur.abs()).sum();
        self.fixed * actions.len() as f64 + self.percent * variable
    }
}

#[derive(Debug, Clone, Copy)]
struct RiskLimits {
    min_cash_reserve: f64,
    max_loss_threshold: f64,
    max_sell_percentage: f64,
    allow_buy: bool,
    allow_sell: bool,
}

#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub start: PortfolioState,
    pub metrics: SecurityMetrics,
    pub target_weights: BTreeMap<String, f64>,
    pub country_weights: BTreeMap<String, f64>,
    pub industry_weights: BTreeMap<String, f64>,
    pub regime_score: f64,
    pub target_return: f64,
    pub costs: CostModel,
    pub start_score: f64,
    holdings: BTreeMap<String, Holding>,
    symbols: HashMap<String, String>,
    limits: RiskLimits,
}

impl EvaluationContext {
    pub fn new(ctx: &OpportunityContext, config: &PlannerConfiguration) -> Self {
        let mut positions = BTreeMap::new();
        let mut holdings = BTreeMap::new();
        let mut symbols = HashMap::new();
        for p in &ctx.positions {
            *positions.entry(p.isin.clone()).or_insert(0.0) += p.market_value_eur;
            holdings.insert(
                p.isin.clone(),
                Holding {
                    quantity: p.quantity,
                    avg_cost: p.avg_cost,
                },
            );
            symbols.insert(p.symbol.clone(), p.isin.clone());
        }

        let mut metrics = SecurityMetrics {
            cagr: ctx.cagrs.clone(),
            volatility: ctx.volatility.clone(),
            sharpe: ctx.sharpe.clone(),
            max_drawdown: ctx.max_drawdown.clone(),
            ..SecurityMetrics::default()
        };
        for s in &ctx.securities {
            symbols.insert(s.symbol.clone(), s.isin.clone());
            if let Some(q) = s.quality_score {
                metrics.quality.insert(s.isin.clone(), q);
            }
            if let Some(d) = s.dividend_yield {
                metrics.dividend.insert(s.isin.clone(), d);
            }
            if !s.country.is_empty() {
                metrics.country.insert(s.isin.clone(), s.country.clone());
            }
            if !s.industry.is_empty() {
                metrics.industry.insert(s.isin.clone(), s.industry.clone());
            }
        }

        let mut eval = Self {
            start: PortfolioState {
                positions,
                cash: ctx.available_cash_eur,
            },
            metrics,
            target_weights: ctx.target_weights.clone(),
            country_weights: ctx.country_weights.clone(),
            industry_weights: ctx.industry_weights.clone(),
            regime_score: ctx.regime_score,
            target_return: config.optimizer_target_return,
            costs: CostModel {
                fixed: config.transaction_cost_fixed,
                percent: config.transaction_cost_percent,
                penalty_factor: config.cost_penalty_factor,
            },
            start_score: 0.0,
            holdings,
            symbols,
            limits: RiskLimits {
                min_cash_reserve: config.min_cash_reserve,
                max_loss_threshold: config.max_loss_threshold,
                max_sell_percentage: config.max_sell_percentage,
                allow_buy: config.allow_buy,
                allow_sell: config.allow_sell,
            },
        };
        eval.start_score = scoring::score_state(&eval.start, &eval, 0.0).final_score;
        eval
    }

    fn isin_for(&self, action: &ActionCandidate) -> String {
        if !action.isin.is_empty() {
            return action.isin.clone();
        }
        self.symbols
            .get(&action.symbol)
            .cloned()
            .unwrap_or_else(|| action.symbol.clone())
    }

    /// Applies the actions in order to a private copy of the starting state.
    /// The first violated constraint makes the whole sequence infeasible.
    pub fn simulate(&self, actions: &[ActionCandidate]) -> Result<PortfolioState, InfeasibilityReason> {
        let mut state = self.start.clone();
        let mut quantities: BTreeMap<String, f64> = self
            .holdings
            .iter()
            .map(|(isin, h)| (isin.clone(), h.quantity))
            .collect();
        let mut touched: Vec<&str> = Vec::with_capacity(actions.len());

        for action in actions {
            if touched.contains(&action.symbol.as_str()) {
                return Err(InfeasibilityReason::ConflictingActions);
            }
            touched.push(action.symbol.as_str());
            let isin = self.isin_for(action);

            match action.side {
                TradeSide::Buy => {
                    if !self.limits.allow_buy {
                        return Err(InfeasibilityReason::SideNotAllowed);
                    }
                    state.cash -= action.value_eur;
                    if state.cash < self.limits.min_cash_reserve - EPSILON {
                        return Err(InfeasibilityReason::InsufficientCash);
                    }
                    *state.positions.entry(isin.clone()).or_insert(0.0) += action.value_eur;
                    *quantities.entry(isin).or_insert(0.0) += action.quantity as f64;
                }
                TradeSide::Sell => {
                    if !self.limits.allow_sell {
                        return Err(InfeasibilityReason::SideNotAllowed);
                    }
                    let held = quantities.get(&isin).copied().unwrap_or(0.0);
                    let selling = action.quantity as f64;
                    if held <= 0.0 || selling > held + EPSILON {
                        return Err(InfeasibilityReason::InsufficientQuantity);
                    }
                    if selling / held > self.limits.max_sell_percentage + EPSILON {
                        return Err(InfeasibilityReason::MaxSellExceeded);
                    }
                    if let Some(holding) = self.holdings.get(&isin) {
                        let floor = holding.avg_cost * (1.0 + self.limits.max_loss_threshold);
                        if holding.avg_cost > 0.0 && action.price < floor - EPSILON {
                            return Err(InfeasibilityReason::MaxLossExceeded);
                        }
                    }

                    state.cash += action.value_eur;
                    let remaining = held - selling;
                    let current_value = state.positions.get(&isin).copied().unwrap_or(0.0);
                    if remaining <= EPSILON {
                        state.positions.remove(&isin);
                    } else {
                        state.positions.insert(isin.clone(), current_value * remaining / held);
                    }
                    quantities.insert(isin, remaining.max(0.0));
                }
            }
        }
        Ok(state)
    }
}
