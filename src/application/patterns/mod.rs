//! Pattern generators.
//!
//! Each pattern reads the candidate pools and emits at most a handful of
//! sequences describing one trading idea. Sequences are capped at
//! `max_depth` and contain each symbol at most once.

pub mod basic;
pub mod funded;
pub mod regime;

use std::collections::HashSet;

use crate::domain::ports::pattern_generator::PatternGenerator;
use crate::domain::values::action::{ActionCandidate, ActionSequence};

use self::basic::{CostOptimizedPattern, DirectBuyPattern, MixedStrategyPattern, MultiSellPattern, SingleBestPattern};
use self::funded::{
    AveragingDownPattern, CashGenerationPattern, DeepRebalancePattern, OpportunityFirstPattern,
    ProfitTakingPattern, RebalancePattern,
};
use self::regime::{AdaptivePattern, MarketRegimePattern};

/// Every built-in pattern; configuration decides which ones run.
pub fn all_patterns() -> Vec<Box<dyn PatternGenerator>> {
    vec![
        Box::new(DirectBuyPattern),
        Box::new(ProfitTakingPattern),
        Box::new(RebalancePattern),
        Box::new(AveragingDownPattern),
        Box::new(SingleBestPattern),
        Box::new(MultiSellPattern),
        Box::new(MixedStrategyPattern),
        Box::new(OpportunityFirstPattern),
        Box::new(DeepRebalancePattern),
        Box::new(CashGenerationPattern),
        Box::new(CostOptimizedPattern),
        Box::new(AdaptivePattern),
        Box::new(MarketRegimePattern),
    ]
}

/// Takes buys in order while they fit the remaining budget, skipping symbols
/// already present in `taken`.
pub(crate) fn fit_buys<'a>(
    buys: impl IntoIterator<Item = &'a ActionCandidate>,
    budget: f64,
    slots: usize,
    taken: &[ActionCandidate],
) -> Vec<ActionCandidate> {
    let mut used: HashSet<&str> = taken.iter().map(|a| a.symbol.as_str()).collect();
    let mut remaining = budget;
    let mut picked = Vec::new();
    for buy in buys {
        if picked.len() >= slots {
            break;
        }
        if used.contains(buy.symbol.as_str()) || buy.value_eur > remaining {
            continue;
        }
        remaining -= buy.value_eur;
        used.insert(buy.symbol.as_str());
        picked.push(buy.clone());
    }
    picked
}

pub(crate) fn proceeds(actions: &[ActionCandidate]) -> f64 {
    actions.iter().filter(|a| a.side.is_sell()).map(|a| a.value_eur).sum()
}

/// Wraps non-empty actions into a one-element result.
pub(crate) fn one(pattern: &str, actions: Vec<ActionCandidate>) -> Vec<ActionSequence> {
    if actions.is_empty() {
        Vec::new()
    } else {
        vec![ActionSequence::new(pattern, actions)]
    }
}

/// Sells followed by budget-fitting buys, never exceeding `max_depth`.
pub(crate) fn sells_then_buys<'a>(
    sells: Vec<ActionCandidate>,
    buys: impl IntoIterator<Item = &'a ActionCandidate>,
    cash: f64,
    max_depth: usize,
) -> Vec<ActionCandidate> {
    let mut actions: Vec<ActionCandidate> = sells.into_iter().take(max_depth).collect();
    let budget = cash + proceeds(&actions);
    let slots = max_depth.saturating_sub(actions.len());
    let picked = fit_buys(buys, budget, slots, &actions);
    actions.extend(picked);
    actions
}


#[cfg(test)]
mod tests {
    use super::fixtures::candidate;
    use super::*;
    use crate::domain::values::opportunity::OpportunityCategory;
    use crate::domain::values::trade_side::TradeSide;

    #[test]
    fn fit_buys_skips_unaffordable_and_taken() {
        let buys = vec![
            candidate(OpportunityCategory::OpportunityBuys, TradeSide::Buy, "A", 600.0, 0.9),
            candidate(OpportunityCategory::OpportunityBuys, TradeSide::Buy, "B", 300.0, 0.8),
            candidate(OpportunityCategory::OpportunityBuys, TradeSide::Buy, "C", 300.0, 0.7),
        ];
        let taken = vec![candidate(OpportunityCategory::RebalanceSells, TradeSide::Sell, "C", 50.0, 0.5)];
        let picked = fit_buys(&buys, 500.0, 5, &taken);
        let symbols: Vec<&str> = picked.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["B"]);
    }

    #[test]
    fn registry_names_are_unique() {
        let names: HashSet<&str> = all_patterns().iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), 13);
    }
}
