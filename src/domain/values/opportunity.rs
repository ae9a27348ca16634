use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::values::action::ActionCandidate;
use crate::domain::values::trade_side::TradeSide;

/// Calculator that produced an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityCategory {
    ProfitTaking,
    AveragingDown,
    OpportunityBuys,
    RebalanceSells,
    RebalanceBuys,
    WeightBased,
}

impl OpportunityCategory {
    pub const ALL: [OpportunityCategory; 6] = [
        OpportunityCategory::ProfitTaking,
        OpportunityCategory::AveragingDown,
        OpportunityCategory::OpportunityBuys,
        OpportunityCategory::RebalanceSells,
        OpportunityCategory::RebalanceBuys,
        OpportunityCategory::WeightBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityCategory::ProfitTaking => "profit_taking",
            OpportunityCategory::AveragingDown => "averaging_down",
            OpportunityCategory::OpportunityBuys => "opportunity_buys",
            OpportunityCategory::RebalanceSells => "rebalance_sells",
            OpportunityCategory::RebalanceBuys => "rebalance_buys",
            OpportunityCategory::WeightBased => "weight_based",
        }
    }
}

impl fmt::Display for OpportunityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpportunityCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpportunityCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown opportunity category: {s}"))
    }
}

fn default_eur_rate() -> f64 {
    1.0
}

/// Atomic candidate trade signal produced by an external calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub category: OpportunityCategory,
    pub side: TradeSide,
    #[serde(default)]
    pub isin: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    #[serde(default)]
    pub currency: String,
    /// Multiplier converting `price` into EUR.
    #[serde(default = "default_eur_rate")]
    pub eur_rate: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: f64,
}

impl Opportunity {
    pub fn value_eur(&self) -> f64 {
        (self.quantity as f64 * self.price * self.eur_rate).abs()
    }

    pub fn to_candidate(&self) -> ActionCandidate {
        ActionCandidate {
            side: self.side,
            isin: self.isin.clone(),
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            quantity: self.quantity,
            price: self.price,
            value_eur: self.value_eur(),
            currency: self.currency.clone(),
            priority: self.priority,
            reason: self.reason.clone(),
            tags: self.tags.clone(),
            category: self.category,
        }
    }
}
