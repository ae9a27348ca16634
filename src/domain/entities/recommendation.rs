use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::values::recommendation_status::RecommendationStatus;
use crate::domain::values::trade_side::TradeSide;

const EMERGENCY_KEYWORDS: [&str; 8] = [
    "emergency",
    "negative balance",
    "margin call",
    "urgent",
    "critical",
    "risk limit",
    "stop loss",
    "forced",
];

/// True when a reason text signals an emergency action.
pub fn is_emergency_reason(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    EMERGENCY_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Fields a caller supplies when creating or refreshing a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationDraft {
    pub symbol: String,
    pub name: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub reason: String,
    pub currency: String,
    pub priority: f64,
    pub current_portfolio_score: f64,
    pub new_portfolio_score: f64,
    pub portfolio_hash: String,
}

impl RecommendationDraft {
    /// Identity used for deduplication.
    pub fn matches(&self, rec: &Recommendation) -> bool {
        rec.symbol == self.symbol
            && rec.side == self.side
            && rec.reason == self.reason
            && rec.portfolio_hash == self.portfolio_hash
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub uuid: String,
    pub symbol: String,
    pub name: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub reason: String,
    pub currency: String,
    pub priority: f64,
    pub current_portfolio_score: f64,
    pub new_portfolio_score: f64,
    pub score_change: f64,
    pub status: RecommendationStatus,
    pub portfolio_hash: String,
    pub retry_count: i64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Recommendation {
    pub fn from_draft(draft: RecommendationDraft, now: DateTime<Utc>) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            score_change: draft.new_portfolio_score - draft.current_portfolio_score,
            symbol: draft.symbol,
            name: draft.name,
            side: draft.side,
            quantity: draft.quantity,
            estimated_price: draft.estimated_price,
            estimated_value: draft.estimated_value,
            reason: draft.reason,
            currency: draft.currency,
            priority: draft.priority,
            current_portfolio_score: draft.current_portfolio_score,
            new_portfolio_score: draft.new_portfolio_score,
            status: RecommendationStatus::Pending,
            portfolio_hash: draft.portfolio_hash,
            retry_count: 0,
            last_attempt_at: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            executed_at: None,
        }
    }

    /// Refreshes the mutable fields from a matching draft, keeping identity and lifecycle.
    pub fn apply_draft(&mut self, draft: &RecommendationDraft, now: DateTime<Utc>) {
        self.name = draft.name.clone();
        self.quantity = draft.quantity;
        self.estimated_price = draft.estimated_price;
        self.estimated_value = draft.estimated_value;
        self.currency = draft.currency.clone();
        self.priority = draft.priority;
        self.current_portfolio_score = draft.current_portfolio_score;
        self.new_portfolio_score = draft.new_portfolio_score;
        self.score_change = draft.new_portfolio_score - draft.current_portfolio_score;
        self.updated_at = now;
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecommendationStatus::Pending
    }

    pub fn is_emergency(&self) -> bool {
        is_emergency_reason(&self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_emergency_keywords() {
        assert!(is_emergency_reason("Stop loss triggered due to margin call"));
        assert!(is_emergency_reason("URGENT: negative balance"));
        assert!(!is_emergency_reason("Rebalance: overweight"));
        assert!(!is_emergency_reason(""));
    }

    #[test]
    fn apply_draft_recomputes_score_change() {
        let now = Utc::now();
        let draft = RecommendationDraft {
            symbol: "AAPL".into(),
            name: "Apple".into(),
            side: TradeSide::Buy,
            quantity: 1,
            estimated_price: 100.0,
            estimated_value: 100.0,
            reason: "underweight".into(),
            currency: "EUR".into(),
            priority: 0.0,
            current_portfolio_score: 0.5,
            new_portfolio_score: 0.6,
            portfolio_hash: "h".into(),
        };
        let mut rec = Recommendation::from_draft(draft.clone(), now);
        assert!((rec.score_change - 0.1).abs() < 1e-9);

        let mut updated = draft;
        updated.new_portfolio_score = 0.7;
        rec.apply_draft(&updated, now);
        assert!((rec.score_change - 0.2).abs() < 1e-9);
        assert!(rec.is_pending());
    }
}
