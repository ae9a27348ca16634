use serde::{Deserialize, Serialize};

use crate::domain::values::audit::{PreFilteredSecurity, RejectedOpportunity, RejectedSequence};
use crate::domain::values::trade_side::TradeSide;

/// One pending recommendation as shown to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanViewStep {
    pub step: usize,
    pub uuid: String,
    pub symbol: String,
    pub name: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub currency: String,
    pub reason: String,
    pub portfolio_score_before: f64,
    pub portfolio_score_after: f64,
    pub score_change: f64,
    pub available_cash_before: f64,
    pub available_cash_after: f64,
    pub is_emergency: bool,
}

/// Plan reconstructed from pending recommendations plus stored audit data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanView {
    pub steps: Vec<PlanViewStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_hash: Option<String>,
    pub current_score: f64,
    pub end_state_score: f64,
    pub total_score_improvement: f64,
    pub final_available_cash: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_opportunities: Option<Vec<RejectedOpportunity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_filtered_securities: Option<Vec<PreFilteredSecurity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_sequences: Option<Vec<RejectedSequence>>,
}
