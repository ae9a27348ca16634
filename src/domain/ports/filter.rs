use crate::domain::values::action::ActionSequence;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::opportunity::Opportunity;
use crate::domain::values::planner_config::PlannerConfiguration;

/// Pre-generation filter over single opportunities.
pub trait OpportunityFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reasons to exclude the opportunity. Empty keeps it.
    fn check(
        &self,
        opportunity: &Opportunity,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
    ) -> Vec<String>;
}

/// Post-generation filter over whole sequences.
pub trait SequenceFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        sequences: Vec<ActionSequence>,
        ctx: &OpportunityContext,
        config: &PlannerConfiguration,
    ) -> Vec<ActionSequence>;
}
