pub mod evaluation;
pub mod expander;
pub mod filters;
pub mod patterns;
pub mod plan_assembler;
pub mod planner;
pub mod recommendations;
pub mod selector;
