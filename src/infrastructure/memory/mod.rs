pub mod audit_log;
pub mod recommendation_repo;
