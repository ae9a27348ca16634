pub mod plan;
pub mod plan_view;
pub mod recommendation;
