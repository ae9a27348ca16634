//! Combinatorial expansion.
//!
//! Turns the union of pattern sequences into the evaluation candidate set:
//! seeds first, then sell/buy combinations from the candidate pools, then
//! pairwise merges of disjoint seeds, then partial-execution prefixes.
//! Every candidate passes the same admission check (depth, conflicting
//! symbols, running cash) and is deduplicated by sequence hash.

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::ports::pattern_generator::CandidatePools;
use crate::domain::values::action::{ActionCandidate, ActionSequence};
use crate::domain::values::planner_config::PlannerConfiguration;
use crate::domain::values::trade_side::TradeSide;

const CASH_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionStats {
    pub generated: usize,
    pub admitted: usize,
    pub duplicates: usize,
    pub pruned_cash: usize,
    pub pruned_conflict: usize,
    pub pruned_depth: usize,
}

#[derive(Debug, Default)]
pub struct Expansion {
    pub sequences: Vec<ActionSequence>,
    pub stats: ExpansionStats,
    /// Every (symbol, side) that appeared in any generated candidate, admitted or not.
    pub seen_keys: HashSet<(String, TradeSide)>,
}

enum Prune {
    Depth,
    Conflict,
    Cash,
}

fn check(actions: &[ActionCandidate], cash: f64, max_depth: usize) -> Result<(), Prune> {
    if actions.len() > max_depth {
        return Err(Prune::Depth);
    }
    let mut symbols = HashSet::new();
    let mut running = cash;
    for action in actions {
        if !symbols.insert(action.symbol.as_str()) {
            return Err(Prune::Conflict);
        }
        match action.side {
            TradeSide::Sell => running += action.value_eur,
            TradeSide::Buy => {
                running -= action.value_eur;
                if running < -CASH_EPSILON {
                    return Err(Prune::Cash);
                }
            }
        }
    }
    Ok(())
}

struct Collector {
    cash: f64,
    max_depth: usize,
    hashes: HashSet<String>,
    out: Expansion,
}

impl Collector {
    fn offer(&mut self, seq: ActionSequence) -> bool {
        if seq.is_empty() {
            return false;
        }
        self.out.stats.generated += 1;
        for action in &seq.actions {
            self.out.seen_keys.insert(action.key());
        }
        match check(&seq.actions, self.cash, self.max_depth) {
            Err(Prune::Depth) => {
                self.out.stats.pruned_depth += 1;
                return false;
            }
            Err(Prune::Conflict) => {
                self.out.stats.pruned_conflict += 1;
                return false;
            }
            Err(Prune::Cash) => {
                self.out.stats.pruned_cash += 1;
                return false;
            }
            Ok(()) => {}
        }
        let hash = seq.hash();
        if !self.hashes.insert(hash) {
            self.out.stats.duplicates += 1;
            return false;
        }
        self.out.stats.admitted += 1;
        self.out.sequences.push(seq);
        true
    }
}

/// Calls `visit` with every k-combination of `0..n` in lexicographic order
/// until it returns `false`.
fn for_each_combination(n: usize, k: usize, visit: &mut dyn FnMut(&[usize]) -> bool) -> bool {
    fn recurse(
        start: usize,
        n: usize,
        k: usize,
        current: &mut Vec<usize>,
        visit: &mut dyn FnMut(&[usize]) -> bool,
    ) -> bool {
        if current.len() == k {
            return visit(current);
        }
        for i in start..n {
            if n - i < k - current.len() {
                break;
            }
            current.push(i);
            let keep_going = recurse(i + 1, n, k, current, visit);
            current.pop();
            if !keep_going {
                return false;
            }
        }
        true
    }
    if k > n {
        return true;
    }
    recurse(0, n, k, &mut Vec::with_capacity(k), visit)
}

/// Sell-subsets followed by buy-subsets from the top candidates, smallest first.
fn combinations(pools: &CandidatePools, config: &PlannerConfiguration, collector: &mut Collector) {
    let half = (config.max_combination_candidates / 2).max(1);
    let sells: Vec<ActionCandidate> = pools
        .sells()
        .into_iter()
        .filter(|c| c.priority >= config.priority_threshold)
        .take(half)
        .collect();
    let buys: Vec<ActionCandidate> = pools
        .buys()
        .into_iter()
        .filter(|c| c.priority >= config.priority_threshold)
        .take(config.max_combination_candidates.saturating_sub(sells.len()).max(1))
        .collect();

    let mut emitted = 0usize;
    for size in 2..=config.max_depth {
        for sell_count in (0..=size.min(sells.len())).rev() {
            let buy_count = size - sell_count;
            if buy_count > buys.len() {
                continue;
            }
            let finished = !for_each_combination(sells.len(), sell_count, &mut |sell_idx: &[usize]| {
                for_each_combination(buys.len(), buy_count, &mut |buy_idx: &[usize]| {
                    if emitted >= config.max_combinations {
                        return false;
                    }
                    let actions: Vec<ActionCandidate> = sell_idx
                        .iter()
                        .map(|i| sells[*i].clone())
                        .chain(buy_idx.iter().map(|i| buys[*i].clone()))
                        .collect();
                    if collector.offer(ActionSequence::new("combinatorial", actions)) {
                        emitted += 1;
                    }
                    true
                })
            });
            if finished || emitted >= config.max_combinations {
                return;
            }
        }
    }
}

/// Pairwise merges of seeds touching disjoint symbols, sells of both first.
fn merges(seeds: &[ActionSequence], config: &PlannerConfiguration, collector: &mut Collector) {
    let mut emitted = 0usize;
    for (i, a) in seeds.iter().enumerate() {
        for b in &seeds[i + 1..] {
            if emitted >= config.max_combinations {
                return;
            }
            if a.len() + b.len() > config.max_depth {
                continue;
            }
            let disjoint = a
                .actions
                .iter()
                .all(|x| b.actions.iter().all(|y| x.symbol != y.symbol));
            if !disjoint {
                continue;
            }
            let actions: Vec<ActionCandidate> = a
                .actions
                .iter()
                .chain(&b.actions)
                .filter(|x| x.side.is_sell())
                .chain(a.actions.iter().chain(&b.actions).filter(|x| x.side.is_buy()))
                .cloned()
                .collect();
            if collector.offer(ActionSequence::new("merge", actions)) {
                emitted += 1;
            }
        }
    }
}

/// Expands pattern seeds into the full candidate set.
pub fn expand(
    seeds: Vec<ActionSequence>,
    pools: &CandidatePools,
    available_cash: f64,
    config: &PlannerConfiguration,
) -> Expansion {
    let mut collector = Collector {
        cash: available_cash,
        max_depth: config.max_depth,
        hashes: HashSet::new(),
        out: Expansion::default(),
    };

    for seed in seeds {
        collector.offer(seed);
    }
    let mut admitted_seeds = collector.out.sequences.clone();
    admitted_seeds.sort_by(|a, b| b.priority.total_cmp(&a.priority));

    if config.generators.combinatorial {
        combinations(pools, config, &mut collector);
    }
    if config.generators.merge {
        merges(&admitted_seeds, config, &mut collector);
    }
    if config.generators.partial_execution {
        let full: Vec<ActionSequence> = collector
            .out
            .sequences
            .iter()
            .filter(|s| s.len() > 1)
            .cloned()
            .collect();
        for seq in full {
            for n in 1..seq.len() {
                let mut prefix = seq.prefix(n);
                prefix.pattern = "partial_execution".to_string();
                collector.offer(prefix);
            }
        }
    }

    collector.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::patterns::fixtures::{candidate, pools};
    use crate::domain::values::opportunity::OpportunityCategory::*;
    use crate::domain::values::trade_side::TradeSide::*;

    fn config() -> PlannerConfiguration {
        PlannerConfiguration::default()
    }

    #[test]
    fn deduplicates_identical_seeds() {
        let a = candidate(OpportunityBuys, Buy, "A", 100.0, 0.9);
        let seeds = vec![
            ActionSequence::new("direct_buy", vec![a.clone()]),
            ActionSequence::new("single_best", vec![a]),
        ];
        let out = expand(seeds, &pools(vec![]), 1000.0, &config());
        assert_eq!(out.stats.duplicates, 1);
        assert_eq!(out.sequences.iter().filter(|s| s.len() == 1).count(), 1);
    }

    #[test]
    fn prunes_conflicts_and_cash() {
        let seeds = vec![
            ActionSequence::new(
                "x",
                vec![
                    candidate(RebalanceSells, Sell, "A", 100.0, 0.9),
                    candidate(RebalanceBuys, Buy, "A", 100.0, 0.9),
                ],
            ),
            ActionSequence::new("y", vec![candidate(OpportunityBuys, Buy, "B", 500.0, 0.9)]),
        ];
        let mut cfg = config();
        cfg.generators.combinatorial = false;
        cfg.generators.merge = false;
        cfg.generators.partial_execution = false;
        let out = expand(seeds, &pools(vec![]), 100.0, &cfg);
        assert!(out.sequences.is_empty());
        assert_eq!(out.stats.pruned_conflict, 1);
        assert_eq!(out.stats.pruned_cash, 1);
    }

    #[test]
    fn earlier_sells_fund_later_buys() {
        let funded = vec![
            candidate(RebalanceSells, Sell, "S", 400.0, 0.9),
            candidate(OpportunityBuys, Buy, "B", 450.0, 0.9),
        ];
        let mut reversed = funded.clone();
        reversed.reverse();
        let mut cfg = config();
        cfg.generators.partial_execution = false;
        cfg.generators.merge = false;
        cfg.generators.combinatorial = false;
        let out = expand(
            vec![ActionSequence::new("a", funded), ActionSequence::new("b", reversed)],
            &pools(vec![]),
            100.0,
            &cfg,
        );
        assert_eq!(out.sequences.len(), 1);
        assert_eq!(out.sequences[0].pattern, "a");
    }

    #[test]
    fn combinations_respect_caps_and_order() {
        let candidates = vec![
            candidate(RebalanceSells, Sell, "S1", 100.0, 0.9),
            candidate(RebalanceSells, Sell, "S2", 100.0, 0.8),
            candidate(OpportunityBuys, Buy, "B1", 100.0, 0.9),
            candidate(OpportunityBuys, Buy, "B2", 100.0, 0.8),
            candidate(OpportunityBuys, Buy, "B3", 100.0, 0.7),
        ];
        let mut cfg = config();
        cfg.max_combinations = 4;
        cfg.generators.merge = false;
        cfg.generators.partial_execution = false;
        let out = expand(vec![], &pools(candidates), 1000.0, &cfg);
        assert_eq!(out.sequences.len(), 4);
        for seq in &out.sequences {
            let first_buy = seq.actions.iter().position(|a| a.side.is_buy()).unwrap_or(seq.len());
            assert!(seq.actions[first_buy..].iter().all(|a| a.side.is_buy()));
        }
    }

    #[test]
    fn partial_execution_adds_prefixes() {
        let seq = ActionSequence::new(
            "multi_sell",
            vec![
                candidate(RebalanceSells, Sell, "S1", 100.0, 0.9),
                candidate(RebalanceSells, Sell, "S2", 100.0, 0.8),
                candidate(OpportunityBuys, Buy, "B1", 150.0, 0.9),
            ],
        );
        let mut cfg = config();
        cfg.generators.merge = false;
        cfg.generators.combinatorial = false;
        let out = expand(vec![seq], &pools(vec![]), 0.0, &cfg);
        assert_eq!(out.sequences.len(), 3);
        assert!(out.sequences[1..].iter().all(|s| s.pattern == "partial_execution"));
    }

    #[test]
    fn combination_enumeration_is_lexicographic() {
        let mut seen = Vec::new();
        for_each_combination(4, 2, &mut |idx: &[usize]| {
            seen.push(idx.to_vec());
            true
        });
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], vec![0, 1]);
        assert_eq!(seen[5], vec![2, 3]);
    }
}
