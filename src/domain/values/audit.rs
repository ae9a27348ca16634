//! Audit records explaining what the planner did not choose.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::values::action::ActionCandidate;
use crate::domain::values::evaluation::InfeasibilityReason;
use crate::domain::values::trade_side::TradeSide;

/// Serialized as a flat string: `lower_score` or the infeasibility cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RejectionReason {
    LowerScore,
    Infeasible(InfeasibilityReason),
}

impl From<RejectionReason> for String {
    fn from(reason: RejectionReason) -> Self {
        reason.to_string()
    }
}

impl TryFrom<String> for RejectionReason {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "lower_score" {
            return Ok(RejectionReason::LowerScore);
        }
        serde_json::from_value(serde_json::Value::String(s.clone()))
            .map(RejectionReason::Infeasible)
            .map_err(|_| format!("Unknown rejection reason: {s}"))
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::LowerScore => write!(f, "lower_score"),
            RejectionReason::Infeasible(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSequence {
    pub rank: usize,
    pub pattern: String,
    pub sequence_hash: String,
    pub actions: Vec<ActionCandidate>,
    pub score: f64,
    pub feasible: bool,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedOpportunity {
    pub side: TradeSide,
    pub symbol: String,
    pub name: String,
    pub original_reason: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreFilteredSecurity {
    pub isin: String,
    pub symbol: String,
    pub name: String,
    pub calculator: String,
    pub reasons: Vec<String>,
}
