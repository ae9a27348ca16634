//! Patterns driven by portfolio shape and market conditions.

use std::collections::BTreeMap;

use crate::domain::error::DomainError;
use crate::domain::ports::pattern_generator::{GenerationContext, PatternGenerator};
use crate::domain::values::action::{ActionCandidate, ActionSequence};
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::opportunity::OpportunityCategory;
use crate::domain::values::planner_config::PlannerConfiguration;

use super::{fit_buys, one, sells_then_buys};

const MIN_GAP: f64 = 0.02;
const MAX_GAPS: usize = 3;
const BULL_THRESHOLD: f64 = 0.3;
const BEAR_THRESHOLD: f64 = -0.3;

/// Current allocation per country as a fraction of total value.
fn country_allocation(ctx: &OpportunityContext) -> BTreeMap<String, f64> {
    let total = ctx.total_value_eur();
    let mut allocation = BTreeMap::new();
    if total <= 0.0 {
        return allocation;
    }
    for position in &ctx.positions {
        let country = ctx
            .security(&position.isin)
            .map(|s| s.country.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "OTHER".to_string());
        *allocation.entry(country).or_insert(0.0) += position.market_value_eur / total;
    }
    allocation
}

/// Largest positive gaps between `targets` and `current`, above [`MIN_GAP`].
fn top_gaps(targets: &BTreeMap<String, f64>, current: &BTreeMap<String, f64>) -> Vec<String> {
    let mut gaps: Vec<(String, f64)> = targets
        .iter()
        .map(|(key, target)| (key.clone(), target - current.get(key).copied().unwrap_or(0.0)))
        .filter(|(_, gap)| *gap > MIN_GAP)
        .collect();
    gaps.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    gaps.into_iter().take(MAX_GAPS).map(|(key, _)| key).collect()
}

/// Buys steering the portfolio toward its most underweight countries, or
/// toward the most underweight target-weight holdings when no country
/// targets are set.
pub struct AdaptivePattern;

impl PatternGenerator for AdaptivePattern {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let snapshot = ctx.snapshot;
        let buys = ctx.pools.buys();
        let mut picks: Vec<ActionCandidate> = Vec::new();

        if !snapshot.country_weights.is_empty() {
            let current = country_allocation(snapshot);
            for country in top_gaps(&snapshot.country_weights, &current) {
                if let Some(buy) = buys.iter().find(|b| {
                    !picks.iter().any(|p| p.symbol == b.symbol)
                        && snapshot
                            .security(&b.isin)
                            .is_some_and(|s| s.country.eq_ignore_ascii_case(&country))
                }) {
                    picks.push(buy.clone());
                }
            }
        } else if !snapshot.target_weights.is_empty() {
            let total = snapshot.total_value_eur();
            let current: BTreeMap<String, f64> = if total > 0.0 {
                snapshot
                    .positions
                    .iter()
                    .map(|p| (p.isin.clone(), p.market_value_eur / total))
                    .collect()
            } else {
                BTreeMap::new()
            };
            for isin in top_gaps(&snapshot.target_weights, &current) {
                if let Some(buy) = buys.iter().find(|b| b.isin == isin) {
                    picks.push(buy.clone());
                }
            }
        }

        let actions = fit_buys(&picks, ctx.available_cash(), config.max_depth, &[]);
        Ok(one(self.name(), actions))
    }
}

/// Shapes the sequence by market regime: harvest gains in a bull market,
/// de-risk and average down in a bear market, rebalance sideways.
pub struct MarketRegimePattern;

impl PatternGenerator for MarketRegimePattern {
    fn name(&self) -> &'static str {
        "market_regime"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let regime = ctx.snapshot.regime_score;
        let pools = ctx.pools;

        let (sells, buys): (Vec<ActionCandidate>, Vec<ActionCandidate>) = if regime > BULL_THRESHOLD {
            (
                pools.pool(OpportunityCategory::ProfitTaking).iter().take(2).cloned().collect(),
                pools.pool(OpportunityCategory::OpportunityBuys).to_vec(),
            )
        } else if regime < BEAR_THRESHOLD {
            let sell_slots = (config.max_depth / 2).max(1);
            (
                pools.sells().into_iter().take(sell_slots).collect(),
                pools.pool(OpportunityCategory::AveragingDown).to_vec(),
            )
        } else {
            (
                pools.pool(OpportunityCategory::RebalanceSells).iter().take(2).cloned().collect(),
                pools.buys(),
            )
        };

        let actions = sells_then_buys(sells, &buys, ctx.available_cash(), config.max_depth);
        Ok(one(self.name(), actions))
    }
}
