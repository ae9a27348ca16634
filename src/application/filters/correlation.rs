use std::collections::HashMap;

use crate::domain::ports::filter::SequenceFilter;
use crate::domain::values::action::ActionSequence;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::planner_config::PlannerConfiguration;

/// Drops sequences that buy two highly correlated securities.
pub struct CorrelationFilter;

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl SequenceFilter for CorrelationFilter {
    fn name(&self) -> &'static str {
        "correlation_aware"
    }

    fn apply(
        &self,
        sequences: Vec<ActionSequence>,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
    ) -> Vec<ActionSequence> {
        if !config.filters.correlation_aware || ctx.correlations.is_empty() {
            return sequences;
        }

        let matrix: HashMap<(String, String), f64> = ctx
            .correlations
            .iter()
            .map(|c| (pair_key(&c.a, &c.b), c.value))
            .collect();

        sequences
            .into_iter()
            .filter(|seq| {
                let buys: Vec<String> = seq
                    .actions
                    .iter()
                    .filter(|a| a.side.is_buy())
                    .map(|a| ctx.resolve_isin(&a.isin, &a.symbol).unwrap_or_else(|| a.symbol.clone()))
                    .collect();
                for (i, a) in buys.iter().enumerate() {
                    for b in &buys[i + 1..] {
                        if let Some(corr) = matrix.get(&pair_key(a, b)) {
                            if corr.abs() > config.correlation_threshold {
                                return false;
                            }
                        }
                    }
                }
                true
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::values::action::ActionCandidate;
    use crate::domain::values::context::CorrelationPair;
    use crate::domain::values::opportunity::OpportunityCategory;
    use crate::domain::values::trade_side::TradeSide;
    use chrono::Utc;

    fn buy(isin: &str) -> ActionCandidate {
        ActionCandidate {
            side: TradeSide::Buy,
            isin: isin.into(),
            symbol: isin.into(),
            name: isin.into(),
            quantity: 1,
            price: 10.0,
            value_eur: 10.0,
            currency: "EUR".into(),
            priority: 0.5,
            reason: String::new(),
            tags: vec![],
            category: OpportunityCategory::OpportunityBuys,
        }
    }

    #[test]
    fn drops_correlated_buy_pairs_in_either_order() {
        let mut ctx = OpportunityContext::new(Utc::now(), 1000.0);
        ctx.correlations = vec![CorrelationPair { a: "B".into(), b: "A".into(), value: -0.85 }];
        let sequences = vec![
            ActionSequence::new("x", vec![buy("A"), buy("B")]),
            ActionSequence::new("y", vec![buy("A"), buy("C")]),
        ];
        let kept = CorrelationFilter.apply(sequences, &ctx, &PlannerConfiguration::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].pattern, "y");
    }
}
