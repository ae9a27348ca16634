use chrono::{DateTime, Utc};

/// Source of "now" for lifecycle timestamps and garbage collection.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
