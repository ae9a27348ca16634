pub mod clock;
pub mod filter;
pub mod pattern_generator;
pub mod progress;
pub mod recommendation_repository;
