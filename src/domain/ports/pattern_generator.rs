//! Pattern generator port.
//!
//! A pattern turns the filtered candidate pools into zero or more candidate
//! [`ActionSequence`]s. Patterns never call each other; combining their
//! output is the expander's job.

use std::collections::{BTreeMap, HashSet};

use crate::domain::error::DomainError;
use crate::domain::values::action::{ActionCandidate, ActionSequence};
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::opportunity::OpportunityCategory;
use crate::domain::values::planner_config::PlannerConfiguration;

/// Eligible candidates grouped by the calculator that produced them.
///
/// Each pool is sorted by priority descending (symbol ascending on ties).
#[derive(Debug, Clone, Default)]
pub struct CandidatePools {
    pools: BTreeMap<OpportunityCategory, Vec<ActionCandidate>>,
}

impl CandidatePools {
    pub fn new(pools: BTreeMap<OpportunityCategory, Vec<ActionCandidate>>) -> Self {
        let mut pools = pools;
        for pool in pools.values_mut() {
            sort_by_priority(pool);
        }
        Self { pools }
    }

    pub fn pool(&self, category: OpportunityCategory) -> &[ActionCandidate] {
        self.pools.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all(&self) -> impl Iterator<Item = &ActionCandidate> {
        self.pools.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.pools.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every SELL across pools, one per symbol, highest priority first.
    pub fn sells(&self) -> Vec<ActionCandidate> {
        self.merged(&[OpportunityCategory::ProfitTaking, OpportunityCategory::RebalanceSells])
    }

    /// Every BUY across pools, one per symbol, highest priority first.
    pub fn buys(&self) -> Vec<ActionCandidate> {
        self.merged(&[
            OpportunityCategory::OpportunityBuys,
            OpportunityCategory::AveragingDown,
            OpportunityCategory::RebalanceBuys,
            OpportunityCategory::WeightBased,
        ])
    }

    /// Union of the given pools with duplicate symbols collapsed to the best candidate.
    pub fn merged(&self, categories: &[OpportunityCategory]) -> Vec<ActionCandidate> {
        let mut merged: Vec<ActionCandidate> = categories
            .iter()
            .flat_map(|c| self.pool(*c).iter().cloned())
            .collect();
        sort_by_priority(&mut merged);
        let mut seen = HashSet::new();
        merged.retain(|c| seen.insert(c.key()));
        merged
    }
}

pub fn sort_by_priority(candidates: &mut [ActionCandidate]) {
    candidates.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

/// Inputs shared by every pattern during one planning run.
pub struct GenerationContext<'a> {
    pub snapshot: &'a OpportunityContext,
    pub pools: &'a CandidatePools,
}

impl GenerationContext<'_> {
    pub fn available_cash(&self) -> f64 {
        self.snapshot.available_cash_eur
    }
}

pub trait PatternGenerator: Send + Sync {
    /// Pattern label attached to every produced sequence.
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        ctx: &GenerationContext<'_>,
        config: &PlannerConfiguration,
    ) -> Result<Vec<ActionSequence>, DomainError>;
}
