//! Planner configuration.
//!
//! Every section carries `#[serde(default)]`, so a partial JSON document
//! overrides only the fields it names.

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::values::opportunity::OpportunityCategory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorToggles {
    pub profit_taking: bool,
    pub averaging_down: bool,
    pub opportunity_buys: bool,
    pub rebalance_sells: bool,
    pub rebalance_buys: bool,
    pub weight_based: bool,
}

impl Default for CalculatorToggles {
    fn default() -> Self {
        Self {
            profit_taking: true,
            averaging_down: true,
            opportunity_buys: true,
            rebalance_sells: true,
            rebalance_buys: true,
            weight_based: true,
        }
    }
}

impl CalculatorToggles {
    pub fn is_enabled(&self, category: OpportunityCategory) -> bool {
        match category {
            OpportunityCategory::ProfitTaking => self.profit_taking,
            OpportunityCategory::AveragingDown => self.averaging_down,
            OpportunityCategory::OpportunityBuys => self.opportunity_buys,
            OpportunityCategory::RebalanceSells => self.rebalance_sells,
            OpportunityCategory::RebalanceBuys => self.rebalance_buys,
            OpportunityCategory::WeightBased => self.weight_based,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternToggles {
    pub direct_buy: bool,
    pub profit_taking: bool,
    pub rebalance: bool,
    pub averaging_down: bool,
    pub single_best: bool,
    pub multi_sell: bool,
    pub mixed_strategy: bool,
    pub opportunity_first: bool,
    pub deep_rebalance: bool,
    pub cash_generation: bool,
    pub cost_optimized: bool,
    pub adaptive: bool,
    pub market_regime: bool,
}

impl Default for PatternToggles {
    fn default() -> Self {
        Self {
            direct_buy: true,
            profit_taking: true,
            rebalance: true,
            averaging_down: true,
            single_best: true,
            multi_sell: true,
            mixed_strategy: true,
            opportunity_first: true,
            deep_rebalance: true,
            cash_generation: true,
            cost_optimized: true,
            adaptive: true,
            market_regime: true,
        }
    }
}

impl PatternToggles {
    /// Unknown pattern names are treated as disabled.
    pub fn is_enabled(&self, pattern: &str) -> bool {
        match pattern {
            "direct_buy" => self.direct_buy,
            "profit_taking" => self.profit_taking,
            "rebalance" => self.rebalance,
            "averaging_down" => self.averaging_down,
            "single_best" => self.single_best,
            "multi_sell" => self.multi_sell,
            "mixed_strategy" => self.mixed_strategy,
            "opportunity_first" => self.opportunity_first,
            "deep_rebalance" => self.deep_rebalance,
            "cash_generation" => self.cash_generation,
            "cost_optimized" => self.cost_optimized,
            "adaptive" => self.adaptive,
            "market_regime" => self.market_regime,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorToggles {
    pub combinatorial: bool,
    pub merge: bool,
    pub partial_execution: bool,
}

impl Default for GeneratorToggles {
    fn default() -> Self {
        Self {
            combinatorial: true,
            merge: true,
            partial_execution: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterToggles {
    pub eligibility: bool,
    pub recently_traded: bool,
    pub tag_based: bool,
    pub correlation_aware: bool,
    pub diversity: bool,
}

impl Default for FilterToggles {
    fn default() -> Self {
        Self {
            eligibility: true,
            recently_traded: true,
            tag_based: true,
            correlation_aware: true,
            diversity: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfiguration {
    pub name: String,
    pub max_depth: usize,
    pub max_opportunities_per_category: usize,
    pub priority_threshold: f64,
    pub max_combinations: usize,
    pub max_combination_candidates: usize,
    pub enable_diverse_selection: bool,
    /// Penalty in [0, 1] applied to candidates overlapping already-ranked picks.
    pub diversity_weight: f64,
    pub transaction_cost_fixed: f64,
    pub transaction_cost_percent: f64,
    pub cost_penalty_factor: f64,
    pub allow_buy: bool,
    pub allow_sell: bool,
    /// Worst tolerated loss on a SELL relative to average cost, e.g. -0.20.
    pub max_loss_threshold: f64,
    /// Largest fraction of a holding a single SELL may dispose of.
    pub max_sell_percentage: f64,
    pub sell_cooldown_days: i64,
    pub buy_cooldown_days: i64,
    pub min_hold_days: i64,
    /// Read-only: carried and validated, not consumed by scoring.
    pub optimizer_blend: f64,
    pub optimizer_target_return: f64,
    pub min_cash_reserve: f64,
    pub correlation_threshold: f64,
    pub max_sequences_per_lead: usize,
    pub blocked_tags: Vec<String>,
    pub calculators: CalculatorToggles,
    pub patterns: PatternToggles,
    pub generators: GeneratorToggles,
    pub filters: FilterToggles,
}

impl Default for PlannerConfiguration {
    fn default() -> Self {
        Self {
            name: "default".into(),
            max_depth: 5,
            max_opportunities_per_category: 5,
            priority_threshold: 0.3,
            max_combinations: 50,
            max_combination_candidates: 12,
            enable_diverse_selection: true,
            diversity_weight: 0.3,
            transaction_cost_fixed: 5.0,
            transaction_cost_percent: 0.001,
            cost_penalty_factor: 0.1,
            allow_buy: true,
            allow_sell: true,
            max_loss_threshold: -0.20,
            max_sell_percentage: 1.0,
            sell_cooldown_days: 180,
            buy_cooldown_days: 30,
            min_hold_days: 90,
            optimizer_blend: 0.5,
            optimizer_target_return: 0.11,
            min_cash_reserve: 0.0,
            correlation_threshold: 0.7,
            max_sequences_per_lead: 5,
            blocked_tags: vec!["value_trap".into(), "bubble_risk".into()],
            calculators: CalculatorToggles::default(),
            patterns: PatternToggles::default(),
            generators: GeneratorToggles::default(),
            filters: FilterToggles::default(),
        }
    }
}

impl PlannerConfiguration {
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        let config: PlannerConfiguration = serde_json::from_str(json)
            .map_err(|e| DomainError::Serialization(format!("Invalid planner configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(1..=10).contains(&self.max_depth) {
            return Err(DomainError::InvalidInput(format!(
                "max_depth must be between 1 and 10, got {}",
                self.max_depth
            )));
        }
        let unit_fields = [
            ("priority_threshold", self.priority_threshold),
            ("diversity_weight", self.diversity_weight),
            ("transaction_cost_percent", self.transaction_cost_percent),
            ("max_sell_percentage", self.max_sell_percentage),
            ("optimizer_blend", self.optimizer_blend),
            ("correlation_threshold", self.correlation_threshold),
        ];
        for (name, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(DomainError::InvalidInput(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        let non_negative = [
            ("transaction_cost_fixed", self.transaction_cost_fixed),
            ("cost_penalty_factor", self.cost_penalty_factor),
            ("min_cash_reserve", self.min_cash_reserve),
        ];
        for (name, value) in non_negative {
            if value < 0.0 || !value.is_finite() {
                return Err(DomainError::InvalidInput(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(-1.0..=0.0).contains(&self.max_loss_threshold) {
            return Err(DomainError::InvalidInput(format!(
                "max_loss_threshold must be within [-1, 0], got {}",
                self.max_loss_threshold
            )));
        }
        if self.sell_cooldown_days < 0 || self.buy_cooldown_days < 0 || self.min_hold_days < 0 {
            return Err(DomainError::InvalidInput("cooldown days must not be negative".into()));
        }
        if self.max_opportunities_per_category == 0 {
            return Err(DomainError::InvalidInput(
                "max_opportunities_per_category must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
