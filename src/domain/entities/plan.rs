use serde::{Deserialize, Serialize};

use crate::domain::values::trade_side::TradeSide;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_number: usize,
    pub side: TradeSide,
    pub isin: String,
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub currency: String,
    pub reason: String,
    pub narrative: String,
    pub is_windfall: bool,
    pub is_averaging_down: bool,
    pub portfolio_score_before: f64,
    pub portfolio_score_after: f64,
    pub cash_before: f64,
    pub cash_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticPlan {
    pub steps: Vec<PlanStep>,
    pub current_score: f64,
    pub end_state_score: f64,
    pub improvement: f64,
    pub narrative_summary: String,
    pub cash_required: f64,
    pub cash_generated: f64,
    pub feasible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_hash: Option<String>,
}

impl HolisticPlan {
    /// A "hold" plan: nothing to do, portfolio stays as it is.
    pub fn hold(current_score: f64) -> Self {
        Self {
            steps: Vec::new(),
            current_score,
            end_state_score: current_score,
            improvement: 0.0,
            narrative_summary: "No action: no feasible sequence improves the portfolio".into(),
            cash_required: 0.0,
            cash_generated: 0.0,
            feasible: true,
            pattern: None,
            sequence_hash: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
