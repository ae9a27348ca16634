use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Duration;

use crate::domain::entities::recommendation::{Recommendation, RecommendationDraft};
use crate::domain::error::DomainError;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::recommendation_repository::{PendingCounts, RecommendationRepository};
use crate::domain::values::audit::{PreFilteredSecurity, RejectedOpportunity, RejectedSequence};
use crate::domain::values::recommendation_status::RecommendationStatus;
use crate::domain::values::trade_side::TradeSide;

use super::audit_log::AuditLog;

#[derive(Default)]
struct Store {
    records: HashMap<String, Recommendation>,
    /// Portfolio hash to UUIDs.
    by_hash: HashMap<String, Vec<String>>,
    /// Insertion order, breaks (priority, created_at) ties.
    order: HashMap<String, u64>,
    next_order: u64,
}

impl Store {
    fn insert(&mut self, rec: Recommendation) {
        self.by_hash
            .entry(rec.portfolio_hash.clone())
            .or_default()
            .push(rec.uuid.clone());
        self.order.insert(rec.uuid.clone(), self.next_order);
        self.next_order += 1;
        self.records.insert(rec.uuid.clone(), rec);
    }

    fn remove(&mut self, uuid: &str) {
        if let Some(rec) = self.records.remove(uuid) {
            if let Some(uuids) = self.by_hash.get_mut(&rec.portfolio_hash) {
                uuids.retain(|u| u != uuid);
                if uuids.is_empty() {
                    self.by_hash.remove(&rec.portfolio_hash);
                }
            }
        }
        self.order.remove(uuid);
    }

    fn in_hash<'a>(&'a self, portfolio_hash: &str) -> impl Iterator<Item = &'a Recommendation> + 'a {
        self.by_hash
            .get(portfolio_hash)
            .into_iter()
            .flatten()
            .filter_map(|uuid| self.records.get(uuid))
    }

    fn sorted(&self, mut recs: Vec<Recommendation>) -> Vec<Recommendation> {
        recs.sort_by(|a, b| {
            a.priority
                .total_cmp(&b.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| self.order.get(&a.uuid).cmp(&self.order.get(&b.uuid)))
        });
        recs
    }
}

/// Map-backed store behind a single reader/writer lock.
pub struct InMemoryRecommendationRepo {
    store: RwLock<Store>,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
}

impl InMemoryRecommendationRepo {
    pub fn new(clock: Arc<dyn Clock>, audit_capacity: usize) -> Self {
        Self {
            store: RwLock::new(Store::default()),
            audit: AuditLog::new(audit_capacity),
            clock,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>, DomainError> {
        self.store.read().map_err(|e| DomainError::Database(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>, DomainError> {
        self.store.write().map_err(|e| DomainError::Database(e.to_string()))
    }

    fn finish(&self, uuid: &str, status: RecommendationStatus, reason: Option<&str>) -> Result<(), DomainError> {
        let now = self.clock.now();
        let mut store = self.write()?;
        let rec = store
            .records
            .get_mut(uuid)
            .ok_or_else(|| DomainError::NotFound(format!("Recommendation not found: {uuid}")))?;
        if !rec.is_pending() {
            return Err(DomainError::InvalidInput(format!(
                "Recommendation {uuid} is {}, not pending",
                rec.status
            )));
        }
        rec.status = status;
        rec.updated_at = now;
        if status == RecommendationStatus::Executed {
            rec.executed_at = Some(now);
        }
        if let Some(reason) = reason {
            rec.failure_reason = Some(reason.to_string());
        }
        Ok(())
    }
}

impl RecommendationRepository for InMemoryRecommendationRepo {
    fn create_or_update(&self, draft: RecommendationDraft) -> Result<String, DomainError> {
        let now = self.clock.now();
        let mut store = self.write()?;

        let existing = store
            .in_hash(&draft.portfolio_hash)
            .filter(|r| r.is_pending() && draft.matches(r))
            .min_by_key(|r| r.created_at)
            .map(|r| r.uuid.clone());
        if let Some(uuid) = existing {
            if let Some(rec) = store.records.get_mut(&uuid) {
                rec.apply_draft(&draft, now);
            }
            return Ok(uuid);
        }

        let rec = Recommendation::from_draft(draft, now);
        let uuid = rec.uuid.clone();
        store.insert(rec);
        Ok(uuid)
    }

    fn get_recommendation(&self, uuid: &str) -> Result<Option<Recommendation>, DomainError> {
        Ok(self.read()?.records.get(uuid).cloned())
    }

    fn find_matching_for_execution(
        &self,
        symbol: &str,
        side: TradeSide,
        portfolio_hash: &str,
    ) -> Result<Vec<Recommendation>, DomainError> {
        let store = self.read()?;
        let matches = store
            .in_hash(portfolio_hash)
            .filter(|r| r.is_pending() && r.symbol == symbol && r.side == side)
            .cloned()
            .collect();
        Ok(store.sorted(matches))
    }

    fn mark_executed(&self, uuid: &str) -> Result<(), DomainError> {
        self.finish(uuid, RecommendationStatus::Executed, None)
    }

    fn record_failed_attempt(&self, uuid: &str, reason: &str) -> Result<(), DomainError> {
        let now = self.clock.now();
        let mut store = self.write()?;
        let rec = store
            .records
            .get_mut(uuid)
            .ok_or_else(|| DomainError::NotFound(format!("Recommendation not found: {uuid}")))?;
        rec.retry_count += 1;
        rec.last_attempt_at = Some(now);
        rec.failure_reason = Some(reason.to_string());
        rec.updated_at = now;
        Ok(())
    }

    fn mark_failed(&self, uuid: &str, reason: &str) -> Result<(), DomainError> {
        self.finish(uuid, RecommendationStatus::Failed, Some(reason))
    }

    fn dismiss_all_pending(&self) -> Result<usize, DomainError> {
        let now = self.clock.now();
        let mut store = self.write()?;
        let mut count = 0;
        for rec in store.records.values_mut().filter(|r| r.is_pending()) {
            rec.status = RecommendationStatus::Dismissed;
            rec.updated_at = now;
            count += 1;
        }
        Ok(count)
    }

    fn dismiss_all_by_portfolio_hash(&self, portfolio_hash: &str) -> Result<usize, DomainError> {
        let now = self.clock.now();
        let mut store = self.write()?;
        let uuids = store.by_hash.get(portfolio_hash).cloned().unwrap_or_default();
        let mut count = 0;
        for uuid in uuids {
            if let Some(rec) = store.records.get_mut(&uuid) {
                if rec.is_pending() {
                    rec.status = RecommendationStatus::Dismissed;
                    rec.updated_at = now;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn get_pending_recommendations(&self, limit: i64) -> Result<Vec<Recommendation>, DomainError> {
        let store = self.read()?;
        let pending = store.records.values().filter(|r| r.is_pending()).cloned().collect();
        let mut sorted = store.sorted(pending);
        if limit > 0 {
            sorted.truncate(limit as usize);
        }
        Ok(sorted)
    }

    fn count_pending_by_side(&self) -> Result<PendingCounts, DomainError> {
        let store = self.read()?;
        let mut counts = PendingCounts::default();
        for rec in store.records.values().filter(|r| r.is_pending()) {
            match rec.side {
                TradeSide::Buy => counts.buy += 1,
                TradeSide::Sell => counts.sell += 1,
            }
        }
        Ok(counts)
    }

    fn delete_older_than(&self, max_age: Duration) -> Result<usize, DomainError> {
        let cutoff = self.clock.now() - max_age;
        let mut store = self.write()?;
        let stale: Vec<String> = store
            .records
            .values()
            .filter(|r| r.created_at < cutoff)
            .map(|r| r.uuid.clone())
            .collect();
        for uuid in &stale {
            store.remove(uuid);
        }
        Ok(stale.len())
    }

    fn store_rejected_opportunities(
        &self,
        portfolio_hash: &str,
        rejected: Vec<RejectedOpportunity>,
    ) -> Result<(), DomainError> {
        self.audit
            .update(portfolio_hash, self.clock.now(), |e| e.rejected_opportunities = rejected)
    }

    fn get_rejected_opportunities(&self, portfolio_hash: &str) -> Result<Vec<RejectedOpportunity>, DomainError> {
        Ok(self
            .audit
            .read(portfolio_hash, |e| e.rejected_opportunities.clone())?
            .unwrap_or_default())
    }

    fn store_pre_filtered_securities(
        &self,
        portfolio_hash: &str,
        pre_filtered: Vec<PreFilteredSecurity>,
    ) -> Result<(), DomainError> {
        self.audit
            .update(portfolio_hash, self.clock.now(), |e| e.pre_filtered_securities = pre_filtered)
    }

    fn get_pre_filtered_securities(&self, portfolio_hash: &str) -> Result<Vec<PreFilteredSecurity>, DomainError> {
        Ok(self
            .audit
            .read(portfolio_hash, |e| e.pre_filtered_securities.clone())?
            .unwrap_or_default())
    }

    fn store_rejected_sequences(
        &self,
        portfolio_hash: &str,
        rejected: Vec<RejectedSequence>,
    ) -> Result<(), DomainError> {
        self.audit
            .update(portfolio_hash, self.clock.now(), |e| e.rejected_sequences = rejected)
    }

    fn get_rejected_sequences(&self, portfolio_hash: &str) -> Result<Vec<RejectedSequence>, DomainError> {
        Ok(self
            .audit
            .read(portfolio_hash, |e| e.rejected_sequences.clone())?
            .unwrap_or_default())
    }

    fn store_evaluated_count(&self, portfolio_hash: &str, count: usize) -> Result<(), DomainError> {
        self.audit
            .update(portfolio_hash, self.clock.now(), |e| e.evaluated_count = Some(count))
    }

    fn get_evaluated_count(&self, portfolio_hash: &str) -> Result<Option<usize>, DomainError> {
        Ok(self.audit.read(portfolio_hash, |e| e.evaluated_count)?.flatten())
    }

    fn prune_audit_older_than(&self, max_age: Duration) -> Result<usize, DomainError> {
        self.audit.prune_before(self.clock.now() - max_age)
    }

    fn latest_audit_hash(&self) -> Result<Option<String>, DomainError> {
        self.audit.latest()
    }
}
