//! Filter pipeline.
//!
//! Opportunity filters run before any sequence exists and turn the raw
//! opportunity list into capped candidate pools. Sequence filters prune the
//! expanded candidate set before evaluation.

pub mod correlation;
pub mod diversity;
pub mod eligibility;
pub mod recently_traded;
pub mod tag_based;

use std::collections::BTreeMap;

use crate::domain::ports::filter::{OpportunityFilter, SequenceFilter};
use crate::domain::ports::pattern_generator::{sort_by_priority, CandidatePools};
use crate::domain::values::action::{ActionCandidate, ActionSequence};
use crate::domain::values::audit::PreFilteredSecurity;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::opportunity::OpportunityCategory;
use crate::domain::values::planner_config::PlannerConfiguration;

use self::correlation::CorrelationFilter;
use self::diversity::DiversityFilter;
use self::eligibility::EligibilityFilter;
use self::recently_traded::RecentlyTradedFilter;
use self::tag_based::TagFilter;

pub fn default_opportunity_filters() -> Vec<Box<dyn OpportunityFilter>> {
    vec![
        Box::new(EligibilityFilter),
        Box::new(RecentlyTradedFilter),
        Box::new(TagFilter),
    ]
}

pub fn default_sequence_filters() -> Vec<Box<dyn SequenceFilter>> {
    vec![Box::new(CorrelationFilter), Box::new(DiversityFilter)]
}

pub struct PreFilterOutcome {
    pub pools: CandidatePools,
    pub pre_filtered: Vec<PreFilteredSecurity>,
}

/// Runs the opportunity filters and builds capped, priority-ordered pools.
pub fn build_candidate_pools(
    ctx: &OpportunityContext,
    config: &PlannerConfiguration,
    filters: &[Box<dyn OpportunityFilter>],
) -> PreFilterOutcome {
    let mut pools: BTreeMap<OpportunityCategory, Vec<ActionCandidate>> = BTreeMap::new();
    let mut pre_filtered: BTreeMap<(String, String), PreFilteredSecurity> = BTreeMap::new();

    for opportunity in &ctx.opportunities {
        if !config.calculators.is_enabled(opportunity.category) {
            continue;
        }

        let mut reasons: Vec<String> = filters
            .iter()
            .flat_map(|f| f.check(opportunity, ctx, config))
            .collect();
        if opportunity.category != OpportunityCategory::WeightBased
            && opportunity.priority < config.priority_threshold
        {
            reasons.push(format!(
                "priority {:.2} below threshold {:.2}",
                opportunity.priority, config.priority_threshold
            ));
        }

        if reasons.is_empty() {
            let mut candidate = opportunity.to_candidate();
            if let Some(isin) = ctx.resolve_isin(&candidate.isin, &candidate.symbol) {
                candidate.isin = isin;
            }
            pools.entry(opportunity.category).or_default().push(candidate);
            continue;
        }

        let key = (opportunity.symbol.clone(), opportunity.category.to_string());
        let entry = pre_filtered.entry(key).or_insert_with(|| PreFilteredSecurity {
            isin: ctx
                .resolve_isin(&opportunity.isin, &opportunity.symbol)
                .unwrap_or_default(),
            symbol: opportunity.symbol.clone(),
            name: opportunity.name.clone(),
            calculator: opportunity.category.to_string(),
            reasons: Vec::new(),
        });
        entry.reasons.extend(reasons);
        entry.reasons.sort();
        entry.reasons.dedup();
    }

    for pool in pools.values_mut() {
        sort_by_priority(pool);
        pool.truncate(config.max_opportunities_per_category);
    }

    PreFilterOutcome {
        pools: CandidatePools::new(pools),
        pre_filtered: pre_filtered.into_values().collect(),
    }
}

pub fn apply_sequence_filters(
    sequences: Vec<ActionSequence>,
    ctx: &OpportunityContext,
    config: &PlannerConfiguration,
    filters: &[Box<dyn SequenceFilter>],
) -> Vec<ActionSequence> {
    filters.iter().fold(sequences, |seqs, filter| {
        let before = seqs.len();
        let kept = filter.apply(seqs, ctx, config);
        if kept.len() < before {
            tracing::debug!(filter = filter.name(), removed = before - kept.len(), "Sequence filter pruned candidates");
        }
        kept
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::domain::values::context::{OpportunityContext, Position, Security};
    use crate::domain::values::opportunity::{Opportunity, OpportunityCategory};
    use crate::domain::values::trade_side::TradeSide;

    pub fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn security(symbol: &str) -> Security {
        Security {
            isin: format!("ISIN-{symbol}"),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            currency: "EUR".into(),
            country: "DE".into(),
            industry: "Industrials".into(),
            allow_buy: true,
            allow_sell: true,
            quality_score: None,
            dividend_yield: None,
        }
    }

    /// HELD is owned (10 shares), NEW is in the universe but not owned.
    pub fn snapshot() -> OpportunityContext {
        let mut ctx = OpportunityContext::new(as_of(), 1000.0);
        ctx.securities = vec![security("HELD"), security("NEW")];
        ctx.positions = vec![Position {
            isin: "ISIN-HELD".into(),
            symbol: "HELD".into(),
            quantity: 10.0,
            avg_cost: 100.0,
            current_price: 110.0,
            market_value_eur: 1100.0,
            first_bought_at: None,
        }];
        ctx
    }

    pub fn opportunity(side: TradeSide, symbol: &str) -> Opportunity {
        let category = match side {
            TradeSide::Buy => OpportunityCategory::OpportunityBuys,
            TradeSide::Sell => OpportunityCategory::ProfitTaking,
        };
        Opportunity {
            category,
            side,
            isin: String::new(),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            quantity: 2,
            price: 110.0,
            currency: "EUR".into(),
            eur_rate: 1.0,
            reason: "signal".into(),
            tags: vec![],
            priority: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{opportunity, snapshot};
    use super::*;
    use crate::domain::values::trade_side::TradeSide;

    #[test]
    fn rejected_opportunities_land_in_pre_filtered() {
        let mut ctx = snapshot();
        ctx.dismissed_symbols = vec!["NEW".into()];
        let mut low = opportunity(TradeSide::Sell, "HELD");
        low.priority = 0.1;
        ctx.opportunities = vec![opportunity(TradeSide::Buy, "NEW"), low];

        let outcome = build_candidate_pools(&ctx, &PlannerConfiguration::default(), &default_opportunity_filters());

        assert_eq!(outcome.pools.len(), 0);
        let symbols: Vec<&str> = outcome.pre_filtered.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["HELD", "NEW"]);
        assert!(outcome.pre_filtered[0].reasons[0].starts_with("priority 0.10 below threshold"));
        assert_eq!(outcome.pre_filtered[1].reasons, vec!["dismissed by user".to_string()]);
    }
}
