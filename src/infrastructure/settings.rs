//! Process settings read from the environment.

use crate::domain::error::DomainError;

pub const DEFAULT_DB_PATH: &str = "planner.db";
pub const IN_MEMORY: &str = ":memory:";
pub const DEFAULT_AUDIT_CAPACITY: usize = 32;
pub const DEFAULT_MAX_RETRIES: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerSettings {
    pub db_path: String,
    /// Evaluation pool size; `None` uses the available parallelism.
    pub workers: Option<usize>,
    pub audit_capacity: usize,
    pub max_retries: i64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            workers: None,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl PlannerSettings {
    pub fn in_memory() -> Self {
        Self {
            db_path: IN_MEMORY.to_string(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DomainError> {
        let defaults = Self::default();
        Ok(Self {
            db_path: lookup("PLANNER_DB")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.db_path),
            workers: parse(&lookup, "PLANNER_WORKERS")?,
            audit_capacity: parse(&lookup, "PLANNER_AUDIT_CAPACITY")?.unwrap_or(defaults.audit_capacity),
            max_retries: parse(&lookup, "PLANNER_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path == IN_MEMORY
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, DomainError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DomainError::InvalidInput(format!("{key} has invalid value: {raw}"))),
    }
}
