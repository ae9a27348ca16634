//! Patterns that work from the merged buy/sell lists without pairing
//! specific calculators.

use crate::domain::error::DomainError;
use crate::domain::ports::pattern_generator::{sort_by_priority, GenerationContext, PatternGenerator};
use crate::domain::values::action::ActionSequence;
use crate::domain::values::planner_config::PlannerConfiguration;

use super::{fit_buys, one, sells_then_buys};

/// Buys that fit within available cash, best first.
pub struct DirectBuyPattern;

impl PatternGenerator for DirectBuyPattern {
    fn name(&self) -> &'static str {
        "direct_buy"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let buys = ctx.pools.buys();
        let actions = fit_buys(&buys, ctx.available_cash(), config.max_depth, &[]);
        Ok(one(self.name(), actions))
    }
}

/// The single highest-priority action. A BUY must fit in cash; a SELL always qualifies.
pub struct SingleBestPattern;

impl PatternGenerator for SingleBestPattern {
    fn name(&self) -> &'static str {
        "single_best"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        _config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let mut all = ctx.pools.sells();
        all.extend(ctx.pools.buys());
        sort_by_priority(&mut all);
        let best = all
            .into_iter()
            .find(|a| a.side.is_sell() || a.value_eur <= ctx.available_cash());
        Ok(one(self.name(), best.into_iter().collect()))
    }
}

/// Every sell, then buys funded by cash plus proceeds.
pub struct MultiSellPattern;

impl PatternGenerator for MultiSellPattern {
    fn name(&self) -> &'static str {
        "multi_sell"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let sells = ctx.pools.sells();
        if sells.is_empty() {
            return Ok(Vec::new());
        }
        let buys = ctx.pools.buys();
        let actions = sells_then_buys(sells, &buys, ctx.available_cash(), config.max_depth);
        Ok(one(self.name(), actions))
    }
}

/// Up to half the depth in sells, the rest in buys.
pub struct MixedStrategyPattern;

impl PatternGenerator for MixedStrategyPattern {
    fn name(&self) -> &'static str {
        "mixed_strategy"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let sell_slots = (config.max_depth / 2).max(1);
        let sells: Vec<_> = ctx.pools.sells().into_iter().take(sell_slots).collect();
        let buys = ctx.pools.buys();
        if sells.is_empty() || buys.is_empty() {
            return Ok(Vec::new());
        }
        let actions = sells_then_buys(sells, &buys, ctx.available_cash(), config.max_depth);
        if actions.iter().all(|a| a.side.is_sell()) {
            return Ok(Vec::new());
        }
        Ok(one(self.name(), actions))
    }
}

/// Fewest trades reaching the top buy: the buy alone, or the smallest single
/// sell that covers the shortfall followed by the buy.
pub struct CostOptimizedPattern;

impl PatternGenerator for CostOptimizedPattern {
    fn name(&self) -> &'static str {
        "cost_optimized"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let buys = ctx.pools.buys();
        let Some(top) = buys.first() else {
            return Ok(Vec::new());
        };
        let cash = ctx.available_cash();
        if top.value_eur <= cash {
            return Ok(one(self.name(), vec![top.clone()]));
        }
        if config.max_depth < 2 {
            return Ok(Vec::new());
        }

        let shortfall = top.value_eur - cash;
        let funding = ctx
            .pools
            .sells()
            .into_iter()
            .filter(|s| s.symbol != top.symbol && s.value_eur >= shortfall)
            .min_by(|a, b| a.value_eur.total_cmp(&b.value_eur).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(match funding {
            Some(sell) => one(self.name(), vec![sell, top.clone()]),
            None => Vec::new(),
        })
    }
}
