use std::collections::HashMap;

use crate::domain::ports::filter::SequenceFilter;
use crate::domain::values::action::ActionSequence;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::trade_side::TradeSide;

/// Caps how many sequences may share the same leading action.
///
/// Within a group the highest-priority sequences survive; the relative order
/// of survivors is unchanged.
pub struct DiversityFilter;

impl SequenceFilter for DiversityFilter {
    fn name(&self) -> &'static str {
        "diversity"
    }

    fn apply(
        &self,
        sequences: Vec<ActionSequence>,
        _ctx: &OpportunityContext,
        config: &PlannerConfiguration,
    ) -> Vec<ActionSequence> {
        if !config.filters.diversity || config.max_sequences_per_lead == 0 {
            return sequences;
        }

        let mut groups: HashMap<(String, TradeSide), Vec<usize>> = HashMap::new();
        for (idx, seq) in sequences.iter().enumerate() {
            if let Some(first) = seq.actions.first() {
                groups.entry(first.key()).or_default().push(idx);
            }
        }

        let mut keep = vec![false; sequences.len()];
        for members in groups.values_mut() {
            members.sort_by(|a, b| {
                sequences[*b]
                    .priority
                    .total_cmp(&sequences[*a].priority)
                    .then_with(|| a.cmp(b))
            });
            for idx in members.iter().take(config.max_sequences_per_lead) {
                keep[*idx] = true;
            }
        }

        sequences
            .into_iter()
            .zip(keep)
            .filter_map(|(seq, kept)| kept.then_some(seq))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::filters::fixtures::snapshot;
    use crate::application::patterns::fixtures::candidate;
    use crate::domain::values::opportunity::OpportunityCategory;

    fn seq(lead: &str, tail: &str, priority: f64) -> ActionSequence {
        let mut s = ActionSequence::new(
            "test",
            vec![
                candidate(OpportunityCategory::ProfitTaking, TradeSide::Sell, lead, 100.0, 0.5),
                candidate(OpportunityCategory::OpportunityBuys, TradeSide::Buy, tail, 50.0, 0.5),
            ],
        );
        s.priority = priority;
        s
    }

    #[test]
    fn caps_sequences_sharing_a_lead() {
        let config = PlannerConfiguration {
            max_sequences_per_lead: 2,
            ..PlannerConfiguration::default()
        };
        let sequences = vec![
            seq("A", "X", 0.3),
            seq("A", "Y", 0.9),
            seq("B", "X", 0.1),
            seq("A", "Z", 0.6),
        ];
        let kept = DiversityFilter.apply(sequences, &snapshot(), &config);
        let shape: Vec<(&str, &str)> = kept
            .iter()
            .map(|s| (s.actions[0].symbol.as_str(), s.actions[1].symbol.as_str()))
            .collect();
        assert_eq!(shape, vec![("A", "Y"), ("B", "X"), ("A", "Z")]);
    }

    #[test]
    fn zero_cap_or_disabled_keeps_all() {
        let sequences = vec![seq("A", "X", 0.3), seq("A", "Y", 0.9)];
        let unlimited = PlannerConfiguration {
            max_sequences_per_lead: 0,
            ..PlannerConfiguration::default()
        };
        assert_eq!(DiversityFilter.apply(sequences.clone(), &snapshot(), &unlimited).len(), 2);

        let mut disabled = PlannerConfiguration {
            max_sequences_per_lead: 1,
            ..PlannerConfiguration::default()
        };
        disabled.filters.diversity = false;
        assert_eq!(DiversityFilter.apply(sequences, &snapshot(), &disabled).len(), 2);
    }
}
