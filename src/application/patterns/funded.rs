//! Patterns that pair a specific calculator's signals with a funding source.

use crate::domain::error::DomainError;
use crate::domain::ports::pattern_generator::{GenerationContext, PatternGenerator};
use crate::domain::values::action::{ActionCandidate, ActionSequence};
use crate::domain::values::opportunity::OpportunityCategory;
use crate::domain::values::planner_config::PlannerConfiguration;

use super::{one, proceeds, sells_then_buys};

/// Takes profits, then reinvests the proceeds into averaging or rebalance buys.
pub struct ProfitTakingPattern;

impl PatternGenerator for ProfitTakingPattern {
    fn name(&self) -> &'static str {
        "profit_taking"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let sell_slots = config.max_depth.saturating_sub(1).max(1);
        let sells: Vec<ActionCandidate> = ctx
            .pools
            .pool(OpportunityCategory::ProfitTaking)
            .iter()
            .take(sell_slots)
            .cloned()
            .collect();
        if sells.is_empty() {
            return Ok(Vec::new());
        }
        let reinvest = ctx
            .pools
            .merged(&[OpportunityCategory::AveragingDown, OpportunityCategory::RebalanceBuys]);
        let actions = sells_then_buys(sells, &reinvest, ctx.available_cash(), config.max_depth);
        Ok(one(self.name(), actions))
    }
}

/// Adds to losing positions; sells one winner first when cash cannot cover the top buy.
pub struct AveragingDownPattern;

impl PatternGenerator for AveragingDownPattern {
    fn name(&self) -> &'static str {
        "averaging_down"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let buys = ctx.pools.pool(OpportunityCategory::AveragingDown);
        let Some(top) = buys.first() else {
            return Ok(Vec::new());
        };

        let mut sells = Vec::new();
        if top.value_eur > ctx.available_cash() && config.max_depth > 1 {
            if let Some(sell) = ctx
                .pools
                .pool(OpportunityCategory::ProfitTaking)
                .iter()
                .find(|s| s.symbol != top.symbol)
            {
                sells.push(sell.clone());
            }
        }
        let actions = sells_then_buys(sells, buys, ctx.available_cash(), config.max_depth);
        if actions.iter().all(|a| a.side.is_sell()) {
            return Ok(Vec::new());
        }
        Ok(one(self.name(), actions))
    }
}

/// Rebalance sells followed by rebalance buys.
pub struct RebalancePattern;

impl PatternGenerator for RebalancePattern {
    fn name(&self) -> &'static str {
        "rebalance"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let sell_slots = (config.max_depth / 2).max(1);
        let sells: Vec<ActionCandidate> = ctx
            .pools
            .pool(OpportunityCategory::RebalanceSells)
            .iter()
            .take(sell_slots)
            .cloned()
            .collect();
        let buys = ctx.pools.pool(OpportunityCategory::RebalanceBuys);
        let actions = sells_then_buys(sells, buys, ctx.available_cash(), config.max_depth);
        Ok(one(self.name(), actions))
    }
}

/// Opportunity buys first in priority, with sells added only as needed to fund them.
pub struct OpportunityFirstPattern;

impl PatternGenerator for OpportunityFirstPattern {
    fn name(&self) -> &'static str {
        "opportunity_first"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let opportunities = ctx.pools.pool(OpportunityCategory::OpportunityBuys);
        let Some(top) = opportunities.first() else {
            return Ok(Vec::new());
        };

        let cash = ctx.available_cash();
        let mut sells: Vec<ActionCandidate> = Vec::new();
        for sell in ctx.pools.sells() {
            if cash + proceeds(&sells) >= top.value_eur || sells.len() + 1 >= config.max_depth {
                break;
            }
            if opportunities.iter().any(|o| o.symbol == sell.symbol) {
                continue;
            }
            sells.push(sell);
        }

        let mut ordered: Vec<ActionCandidate> = opportunities.to_vec();
        ordered.extend(ctx.pools.buys());
        let actions = sells_then_buys(sells, &ordered, cash, config.max_depth);
        if actions.iter().all(|a| a.side.is_sell()) {
            return Ok(Vec::new());
        }
        Ok(one(self.name(), actions))
    }
}

/// Full rebalance: needs both sides and uses the whole depth.
pub struct DeepRebalancePattern;

impl PatternGenerator for DeepRebalancePattern {
    fn name(&self) -> &'static str {
        "deep_rebalance"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let sells = ctx.pools.pool(OpportunityCategory::RebalanceSells);
        let buys = ctx.pools.pool(OpportunityCategory::RebalanceBuys);
        if sells.is_empty() || buys.is_empty() || config.max_depth < 2 {
            return Ok(Vec::new());
        }
        let sell_slots = config.max_depth.div_ceil(2).min(config.max_depth - 1);
        let chosen: Vec<ActionCandidate> = sells.iter().take(sell_slots).cloned().collect();
        let actions = sells_then_buys(chosen, buys, ctx.available_cash(), config.max_depth);
        if actions.iter().all(|a| a.side.is_sell()) {
            return Ok(Vec::new());
        }
        Ok(one(self.name(), actions))
    }
}

/// Raises cash from every sell signal, then redeploys it preferring
/// opportunity buys over averaging over rebalance.
pub struct CashGenerationPattern;

impl PatternGenerator for CashGenerationPattern {
    fn name(&self) -> &'static str {
        "cash_generation"
    }

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError> {
        let sell_slots = config.max_depth.saturating_sub(1).max(1);
        let sells: Vec<ActionCandidate> = ctx.pools.sells().into_iter().take(sell_slots).collect();
        if sells.is_empty() {
            return Ok(Vec::new());
        }
        let preference = [
            OpportunityCategory::OpportunityBuys,
            OpportunityCategory::AveragingDown,
            OpportunityCategory::RebalanceBuys,
        ];
        let buys: Vec<&ActionCandidate> = preference
            .iter()
            .flat_map(|c| ctx.pools.pool(*c).iter())
            .collect();
        let actions = sells_then_buys(sells, buys, ctx.available_cash(), config.max_depth);
        Ok(one(self.name(), actions))
    }
}
