//! Read-only planning snapshot.
//!
//! Assembled once before planning starts and passed by shared reference to
//! every stage. Maps are ordered so that weighted sums iterate the same way on
//! every run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::values::opportunity::Opportunity;
use crate::domain::values::trade_side::TradeSide;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub isin: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default = "default_true")]
    pub allow_buy: bool,
    #[serde(default = "default_true")]
    pub allow_sell: bool,
    /// Composite quality score in [0, 1].
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub dividend_yield: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub isin: String,
    pub symbol: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub current_price: f64,
    pub market_value_eur: f64,
    #[serde(default)]
    pub first_bought_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTrade {
    pub isin: String,
    #[serde(default)]
    pub symbol: String,
    pub side: TradeSide,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub a: String,
    pub b: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityContext {
    /// Snapshot time; all cooldown arithmetic uses this, never the wall clock.
    pub as_of: DateTime<Utc>,
    #[serde(default)]
    pub securities: Vec<Security>,
    #[serde(default)]
    pub positions: Vec<Position>,
    pub available_cash_eur: f64,
    #[serde(default)]
    pub total_portfolio_value_eur: f64,
    #[serde(default)]
    pub opportunities: Vec<Opportunity>,
    /// Optimizer target weights keyed by ISIN.
    #[serde(default)]
    pub target_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub country_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub industry_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub cagrs: BTreeMap<String, f64>,
    #[serde(default)]
    pub volatility: BTreeMap<String, f64>,
    #[serde(default)]
    pub sharpe: BTreeMap<String, f64>,
    #[serde(default)]
    pub max_drawdown: BTreeMap<String, f64>,
    /// Market regime in [-1, 1]; positive is bullish.
    #[serde(default)]
    pub regime_score: f64,
    #[serde(default)]
    pub correlations: Vec<CorrelationPair>,
    #[serde(default)]
    pub recent_trades: Vec<RecentTrade>,
    #[serde(default)]
    pub dismissed_symbols: Vec<String>,
    #[serde(default)]
    pub pending_order_symbols: Vec<String>,
}

impl OpportunityContext {
    pub fn new(as_of: DateTime<Utc>, available_cash_eur: f64) -> Self {
        Self {
            as_of,
            securities: Vec::new(),
            positions: Vec::new(),
            available_cash_eur,
            total_portfolio_value_eur: available_cash_eur,
            opportunities: Vec::new(),
            target_weights: BTreeMap::new(),
            country_weights: BTreeMap::new(),
            industry_weights: BTreeMap::new(),
            cagrs: BTreeMap::new(),
            volatility: BTreeMap::new(),
            sharpe: BTreeMap::new(),
            max_drawdown: BTreeMap::new(),
            regime_score: 0.0,
            correlations: Vec::new(),
            recent_trades: Vec::new(),
            dismissed_symbols: Vec::new(),
            pending_order_symbols: Vec::new(),
        }
    }

    pub fn security(&self, isin: &str) -> Option<&Security> {
        self.securities.iter().find(|s| s.isin == isin)
    }

    pub fn security_by_symbol(&self, symbol: &str) -> Option<&Security> {
        self.securities.iter().find(|s| s.symbol == symbol)
    }

    pub fn position(&self, isin: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.isin == isin)
    }

    pub fn position_by_symbol(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// Resolves an ISIN, preferring the explicit one and falling back to a symbol lookup.
    pub fn resolve_isin(&self, isin: &str, symbol: &str) -> Option<String> {
        if !isin.is_empty() {
            return Some(isin.to_string());
        }
        self.security_by_symbol(symbol)
            .map(|s| s.isin.clone())
            .or_else(|| self.position_by_symbol(symbol).map(|p| p.isin.clone()))
    }

    pub fn positions_value_eur(&self) -> f64 {
        self.positions.iter().map(|p| p.market_value_eur).sum()
    }

    /// Declared total, or positions plus cash when the producer left it unset.
    pub fn total_value_eur(&self) -> f64 {
        if self.total_portfolio_value_eur > 0.0 {
            self.total_portfolio_value_eur
        } else {
            self.positions_value_eur() + self.available_cash_eur
        }
    }

    pub fn is_dismissed(&self, symbol: &str) -> bool {
        self.dismissed_symbols
            .iter()
            .any(|s| s.eq_ignore_ascii_case(symbol))
    }

    /// Most recent trade on the given side for an ISIN.
    pub fn last_trade(&self, isin: &str, side: TradeSide) -> Option<DateTime<Utc>> {
        self.recent_trades
            .iter()
            .filter(|t| t.isin == isin && t.side == side)
            .map(|t| t.executed_at)
            .max()
    }
}
