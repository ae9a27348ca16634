use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a sequence cannot be executed. The first violated step decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfeasibilityReason {
    InsufficientCash,
    InsufficientQuantity,
    ConflictingActions,
    MaxLossExceeded,
    MaxSellExceeded,
    SideNotAllowed,
}

impl InfeasibilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfeasibilityReason::InsufficientCash => "insufficient_cash",
            InfeasibilityReason::InsufficientQuantity => "insufficient_quantity",
            InfeasibilityReason::ConflictingActions => "conflicting_actions",
            InfeasibilityReason::MaxLossExceeded => "max_loss_exceeded",
            InfeasibilityReason::MaxSellExceeded => "max_sell_exceeded",
            InfeasibilityReason::SideNotAllowed => "side_not_allowed",
        }
    }
}

impl fmt::Display for InfeasibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Score of the untouched starting portfolio.
    pub start_score: f64,
    pub quality: f64,
    pub diversification: f64,
    pub risk: f64,
    pub improvement: f64,
    pub transaction_cost: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub sequence_hash: String,
    pub portfolio_hash: String,
    pub end_score: f64,
    pub breakdown: ScoreBreakdown,
    pub end_cash_eur: f64,
    /// End market value in EUR keyed by ISIN.
    pub end_positions: BTreeMap<String, f64>,
    pub total_value_eur: f64,
    pub feasible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infeasibility: Option<InfeasibilityReason>,
}
