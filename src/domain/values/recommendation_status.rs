use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a recommendation. `Executed`, `Dismissed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Executed,
    Dismissed,
    Failed,
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationStatus::Pending => write!(f, "pending"),
            RecommendationStatus::Executed => write!(f, "executed"),
            RecommendationStatus::Dismissed => write!(f, "dismissed"),
            RecommendationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RecommendationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RecommendationStatus::Pending),
            "executed" => Ok(RecommendationStatus::Executed),
            "dismissed" => Ok(RecommendationStatus::Dismissed),
            "failed" => Ok(RecommendationStatus::Failed),
            _ => Err(format!("Unknown recommendation status: {s}")),
        }
    }
}
