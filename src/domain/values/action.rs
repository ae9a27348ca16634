//! Concrete actions and ordered action sequences.
//!
//! A sequence is identified by a digest over its ordered
//! `(symbol, side, quantity)` tuples. Order matters: an early SELL can fund a
//! later BUY, so reordering the same actions yields a different candidate.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::values::opportunity::OpportunityCategory;
use crate::domain::values::trade_side::TradeSide;

/// One concrete trade inside a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub side: TradeSide,
    #[serde(default)]
    pub isin: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    /// Whole shares.
    pub quantity: i64,
    pub price: f64,
    /// Estimated value in EUR, always positive.
    pub value_eur: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: OpportunityCategory,
}

impl ActionCandidate {
    /// Key used to match candidates across sequences and audit records.
    pub fn key(&self) -> (String, TradeSide) {
        (self.symbol.clone(), self.side)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Ordered list of actions evaluated as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSequence {
    pub pattern: String,
    pub actions: Vec<ActionCandidate>,
    #[serde(default)]
    pub sequence_hash: String,
    #[serde(default)]
    pub priority: f64,
}

impl ActionSequence {
    pub fn new(pattern: impl Into<String>, actions: Vec<ActionCandidate>) -> Self {
        let sequence_hash = hash_actions(&actions);
        let priority = actions.iter().map(|a| a.priority).sum();
        Self {
            pattern: pattern.into(),
            actions,
            sequence_hash,
            priority,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Stored hash when present, otherwise recomputed from the actions.
    pub fn hash(&self) -> String {
        if self.sequence_hash.is_empty() {
            hash_actions(&self.actions)
        } else {
            self.sequence_hash.clone()
        }
    }

    pub fn contains(&self, symbol: &str, side: TradeSide) -> bool {
        self.actions
            .iter()
            .any(|a| a.side == side && a.symbol == symbol)
    }

    pub fn sell_proceeds(&self) -> f64 {
        self.actions
            .iter()
            .filter(|a| a.side.is_sell())
            .map(|a| a.value_eur)
            .sum()
    }

    pub fn buy_cost(&self) -> f64 {
        self.actions
            .iter()
            .filter(|a| a.side.is_buy())
            .map(|a| a.value_eur)
            .sum()
    }

    /// Returns a copy holding only the first `n` actions.
    pub fn prefix(&self, n: usize) -> ActionSequence {
        let actions = self.actions.iter().take(n).cloned().collect();
        ActionSequence::new(self.pattern.clone(), actions)
    }
}

/// Order-sensitive digest over `(symbol, side, quantity)` tuples.
pub fn hash_actions(actions: &[ActionCandidate]) -> String {
    let mut hasher = Sha256::new();
    for action in actions {
        hasher.update(action.symbol.as_bytes());
        hasher.update([0x1f]);
        hasher.update(action.side.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(action.quantity.to_le_bytes());
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(symbol: &str, side: TradeSide, quantity: i64) -> ActionCandidate {
        ActionCandidate {
            side,
            isin: format!("ISIN-{symbol}"),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            quantity,
            price: 10.0,
            value_eur: quantity as f64 * 10.0,
            currency: "EUR".into(),
            priority: 0.5,
            reason: String::new(),
            tags: vec![],
            category: OpportunityCategory::RebalanceBuys,
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let actions = vec![action("AAPL", TradeSide::Sell, 2), action("MSFT", TradeSide::Buy, 5)];
        assert_eq!(hash_actions(&actions), hash_actions(&actions.clone()));
        assert_eq!(hash_actions(&actions).len(), 64);
    }

    #[test]
    fn reversing_order_changes_hash() {
        let actions = vec![action("AAPL", TradeSide::Sell, 2), action("MSFT", TradeSide::Buy, 5)];
        let mut reversed = actions.clone();
        reversed.reverse();
        assert_ne!(hash_actions(&actions), hash_actions(&reversed));
    }

    #[test]
    fn hash_ignores_price_and_reason() {
        let a = vec![action("AAPL", TradeSide::Buy, 3)];
        let mut b = a.clone();
        b[0].price = 99.0;
        b[0].reason = "different".into();
        assert_eq!(hash_actions(&a), hash_actions(&b));
    }

    #[test]
    fn quantity_changes_hash() {
        let a = vec![action("AAPL", TradeSide::Buy, 3)];
        let b = vec![action("AAPL", TradeSide::Buy, 4)];
        assert_ne!(hash_actions(&a), hash_actions(&b));
    }

    #[test]
    fn missing_hash_is_recomputed() {
        let mut seq = ActionSequence::new("direct_buy", vec![action("AAPL", TradeSide::Buy, 1)]);
        let expected = seq.sequence_hash.clone();
        seq.sequence_hash.clear();
        assert_eq!(seq.hash(), expected);
    }

    #[test]
    fn prefix_rehashes() {
        let seq = ActionSequence::new(
            "multi_sell",
            vec![action("AAPL", TradeSide::Sell, 2), action("MSFT", TradeSide::Buy, 5)],
        );
        let head = seq.prefix(1);
        assert_eq!(head.len(), 1);
        assert_eq!(head.sequence_hash, hash_actions(&seq.actions[..1]));
    }
}
