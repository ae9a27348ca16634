use crate::domain::ports::filter::OpportunityFilter;
use crate::domain::values::context::OpportunityContext;
use crate::domain::values::opportunity::Opportunity;
use crate::domain::values::planner_config::PlannerConfiguration;

/// Excludes opportunities carrying any configured blocked tag.
pub struct TagFilter;

impl OpportunityFilter for TagFilter {
    fn name(&self) -> &'static str {
        "tag_based"
    }

    fn check(
        &self,
        opportunity: &Opportunity,
        _ctx: &OpportunityContext,
        config: &PlannerConfiguration,
    ) -> Vec<String> {
        if !config.filters.tag_based {
            return Vec::new();
        }
        opportunity
            .tags
            .iter()
            .filter(|tag| config.blocked_tags.iter().any(|b| b.eq_ignore_ascii_case(tag)))
            .map(|tag| format!("blocked tag: {tag}"))
            .collect()
    }
}
