pub mod action;
pub mod audit;
pub mod context;
pub mod evaluation;
pub mod opportunity;
pub mod planner_config;
pub mod portfolio_hash;
pub mod progress;
pub mod recommendation_status;
pub mod trade_side;
