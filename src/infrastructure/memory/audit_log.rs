//! Bounded audit storage keyed by portfolio hash.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use lru::LruCache;

use crate::domain::error::DomainError;
use crate::domain::values::audit::{PreFilteredSecurity, RejectedOpportunity, RejectedSequence};

#[derive(Debug, Clone, Default)]
pub struct AuditEntry {
    pub rejected_opportunities: Vec<RejectedOpportunity>,
    pub pre_filtered_securities: Vec<PreFilteredSecurity>,
    pub rejected_sequences: Vec<RejectedSequence>,
    pub evaluated_count: Option<usize>,
    pub stored_at: Option<DateTime<Utc>>,
}

/// Least recently written hashes are evicted once capacity is reached.
pub struct AuditLog {
    entries: Mutex<LruCache<String, AuditEntry>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn update(
        &self,
        portfolio_hash: &str,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut AuditEntry),
    ) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        if !entries.contains(portfolio_hash) {
            entries.put(portfolio_hash.to_string(), AuditEntry::default());
        }
        if let Some(entry) = entries.get_mut(portfolio_hash) {
            apply(entry);
            entry.stored_at = Some(now);
        }
        Ok(())
    }

    /// Reads without touching recency.
    pub fn read<T>(&self, portfolio_hash: &str, read: impl FnOnce(&AuditEntry) -> T) -> Result<Option<T>, DomainError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(entries.peek(portfolio_hash).map(read))
    }

    /// Removes entries last written before `cutoff`.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DomainError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.stored_at.is_some_and(|t| t < cutoff))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        Ok(stale.len())
    }

    /// Hash of the most recently written entry.
    pub fn latest(&self) -> Result<Option<String>, DomainError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(entries.iter().next().map(|(k, _)| k.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
