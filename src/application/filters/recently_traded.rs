//! Cooldown filter: recent trades, minimum holding period, user dismissals.

use chrono::Duration;

use crate::domain::ports::filter::OpportunityFilter;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::opportunity::Opportunity;
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::trade_side::TradeSide;

pub struct RecentlyTradedFilter;

impl OpportunityFilter for RecentlyTradedFilter {
    fn name(&self) -> &'static str {
        "recently_traded"
    }

    fn check(
        &self,
        opportunity: &Opportunity,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
    ) -> Vec<String> {
        if !config.filters.recently_traded {
            return Vec::new();
        }

        let mut reasons = Vec::new();
        if ctx.is_dismissed(&opportunity.symbol) {
            reasons.push("dismissed by user".to_string());
        }

        let Some(isin) = ctx.resolve_isin(&opportunity.isin, &opportunity.symbol) else {
            return reasons;
        };

        match opportunity.side {
            TradeSide::Sell => {
                if let Some(last_sell) = ctx.last_trade(&isin, TradeSide::Sell) {
                    let days = (ctx.as_of - last_sell).num_days();
                    if ctx.as_of - last_sell < Duration::days(config.sell_cooldown_days) {
                        reasons.push(format!(
                            "sell cooldown: sold {days} days ago (cooldown {} days)",
                            config.sell_cooldown_days
                        ));
                    }
                }
                if let Some(first_buy) = ctx.position(&isin).and_then(|p| p.first_bought_at) {
                    let held = ctx.as_of - first_buy;
                    if held < Duration::days(config.min_hold_days) {
                        reasons.push(format!(
                            "held {} days, minimum hold is {} days",
                            held.num_days(),
                            config.min_hold_days
                        ));
                    }
                }
            }
            TradeSide::Buy => {
                if let Some(last_buy) = ctx.last_trade(&isin, TradeSide::Buy) {
                    if ctx.as_of - last_buy < Duration::days(config.buy_cooldown_days) {
                        reasons.push(format!(
                            "buy cooldown: bought {} days ago (cooldown {} days)",
                            (ctx.as_of - last_buy).num_days(),
                            config.buy_cooldown_days
                        ));
                    }
                }
            }
        }
        reasons
    }
}
