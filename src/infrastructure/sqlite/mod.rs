pub mod migrations;
pub mod recommendation_repo;
