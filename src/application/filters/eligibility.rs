//! Eligibility filter: tradability flags, holdings and basic sanity.

use crate::domain::ports::filter::OpportunityFilter;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::opportunity::Opportunity;
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::trade_side::TradeSide;

pub struct EligibilityFilter;

impl OpportunityFilter for EligibilityFilter {
    fn name(&self) -> &'static str {
        "eligibility"
    }

    fn check(
        &self,
        opportunity: &Opportunity,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
    ) -> Vec<String> {
        if !config.filters.eligibility {
            return Vec::new();
        }

        let mut reasons = Vec::new();
        if opportunity.quantity <= 0 {
            reasons.push("quantity must be positive".to_string());
        }
        if opportunity.price <= 0.0 {
            reasons.push("price must be positive".to_string());
        }

        let isin = ctx.resolve_isin(&opportunity.isin, &opportunity.symbol);
        let security = isin.as_deref().and_then(|i| ctx.security(i));
        let Some(security) = security else {
            reasons.push("security not in universe".to_string());
            return reasons;
        };

        match opportunity.side {
            TradeSide::Buy => {
                if !config.allow_buy {
                    reasons.push("buying disabled".to_string());
                }
                if !security.allow_buy {
                    reasons.push("security not allowed for buying".to_string());
                }
            }
            TradeSide::Sell => {
                if !config.allow_sell {
                    reasons.push("selling disabled".to_string());
                }
                if !security.allow_sell {
                    reasons.push("security not allowed for selling".to_string());
                }
                match ctx.position(&security.isin) {
                    Some(p) if p.quantity > 0.0 => {}
                    _ => reasons.push("no position to sell".to_string()),
                }
            }
        }
        reasons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::filters::fixtures::{opportunity, snapshot};

    fn check(ctx: &OpportunityContext, opportunity: &Opportunity) -> Vec<String> {
        EligibilityFilter.check(opportunity, ctx, &PlannerConfiguration::default())
    }

    #[test]
    fn eligible_buy_and_sell_pass() {
        let ctx = snapshot();
        assert!(check(&ctx, &opportunity(TradeSide::Buy, "NEW")).is_empty());
        assert!(check(&ctx, &opportunity(TradeSide::Sell, "HELD")).is_empty());
    }

    #[test]
    fn sell_without_position_is_rejected() {
        let ctx = snapshot();
        assert_eq!(
            check(&ctx, &opportunity(TradeSide::Sell, "NEW")),
            vec!["no position to sell".to_string()]
        );
    }

    #[test]
    fn security_flags_are_respected() {
        let mut ctx = snapshot();
        ctx.securities[0].allow_sell = false;
        ctx.securities[1].allow_buy = false;
        assert_eq!(
            check(&ctx, &opportunity(TradeSide::Sell, "HELD")),
            vec!["security not allowed for selling".to_string()]
        );
        assert_eq!(
            check(&ctx, &opportunity(TradeSide::Buy, "NEW")),
            vec!["security not allowed for buying".to_string()]
        );
    }

    #[test]
    fn unknown_security_is_rejected() {
        let ctx = snapshot();
        assert_eq!(
            check(&ctx, &opportunity(TradeSide::Buy, "GHOST")),
            vec!["security not in universe".to_string()]
        );
    }

    #[test]
    fn side_switches_and_sanity_checks() {
        let ctx = snapshot();
        let config = PlannerConfiguration {
            allow_sell: false,
            ..PlannerConfiguration::default()
        };
        assert_eq!(
            EligibilityFilter.check(&opportunity(TradeSide::Sell, "HELD"), &ctx, &config),
            vec!["selling disabled".to_string()]
        );

        let mut bad = opportunity(TradeSide::Buy, "NEW");
        bad.quantity = 0;
        bad.price = 0.0;
        assert_eq!(
            check(&ctx, &bad),
            vec!["quantity must be positive".to_string(), "price must be positive".to_string()]
        );
    }
}
