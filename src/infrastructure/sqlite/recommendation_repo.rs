use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::entities::plan::HolisticPlan;
use crate::domain::entities::recommendation::{Recommendation, RecommendationDraft};
use crate::domain::error::DomainError;
use crate::domain::ports::clock::Clock;
use crate::domain::ports::recommendation_repository::{
    log_dismissal, log_stored, plan_drafts, step_error, PendingCounts, RecommendationRepository,
};
use crate::domain::values::audit::{PreFilteredSecurity, RejectedOpportunity, RejectedSequence};
use crate::domain::values::recommendation_status::RecommendationStatus;
use crate::domain::values::trade_side::TradeSide;

const COLUMNS: &str = "uuid, symbol, name, side, quantity, estimated_price, estimated_value, reason, currency, \
     priority, current_portfolio_score, new_portfolio_score, score_change, status, portfolio_hash, \
     retry_count, last_attempt_at, failure_reason, created_at, updated_at, executed_at";

const KIND_REJECTED_OPPORTUNITIES: &str = "rejected_opportunities";
const KIND_PRE_FILTERED: &str = "pre_filtered_securities";
const KIND_REJECTED_SEQUENCES: &str = "rejected_sequences";
const KIND_EVALUATED_COUNT: &str = "evaluated_count";

/// Fixed-width UTC timestamps, so text order is time order.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_text<T: std::str::FromStr<Err = String>>(idx: usize, s: &str) -> Result<T, rusqlite::Error> {
    s.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub struct SqliteRecommendationRepo {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    audit_capacity: usize,
}

impl SqliteRecommendationRepo {
    /// Wraps a connection whose schema is already migrated.
    pub fn new(conn: Connection, clock: Arc<dyn Clock>, audit_capacity: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            clock,
            audit_capacity: audit_capacity.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DomainError> {
        self.conn.lock().map_err(|e| DomainError::Database(e.to_string()))
    }

    fn row_to_recommendation(row: &rusqlite::Row) -> Result<Recommendation, rusqlite::Error> {
        let side: String = row.get(3)?;
        let status: String = row.get(13)?;
        let last_attempt: Option<String> = row.get(16)?;
        let created: String = row.get(18)?;
        let updated: String = row.get(19)?;
        let executed: Option<String> = row.get(20)?;

        Ok(Recommendation {
            uuid: row.get(0)?,
            symbol: row.get(1)?,
            name: row.get(2)?,
            side: parse_text::<TradeSide>(3, &side)?,
            quantity: row.get(4)?,
            estimated_price: row.get(5)?,
            estimated_value: row.get(6)?,
            reason: row.get(7)?,
            currency: row.get(8)?,
            priority: row.get(9)?,
            current_portfolio_score: row.get(10)?,
            new_portfolio_score: row.get(11)?,
            score_change: row.get(12)?,
            status: parse_text::<RecommendationStatus>(13, &status)?,
            portfolio_hash: row.get(14)?,
            retry_count: row.get(15)?,
            last_attempt_at: last_attempt.map(|s| parse_ts(16, &s)).transpose()?,
            failure_reason: row.get(17)?,
            created_at: parse_ts(18, &created)?,
            updated_at: parse_ts(19, &updated)?,
            executed_at: executed.map(|s| parse_ts(20, &s)).transpose()?,
        })
    }

    fn query_recommendations(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::types::ToSql],
    ) -> Result<Vec<Recommendation>, DomainError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, Self::row_to_recommendation)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| DomainError::Database(format!("Failed to read recommendations: {e}")))
    }

    /// Moves a pending record to a terminal status.
    fn finish(&self, uuid: &str, status: RecommendationStatus, reason: Option<&str>) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let now = ts(self.clock.now());
        let executed_at = (status == RecommendationStatus::Executed).then(|| now.clone());
        let rows = conn
            .execute(
                "UPDATE recommendations
                 SET status = ?1, updated_at = ?2, executed_at = COALESCE(?3, executed_at),
                     failure_reason = COALESCE(?4, failure_reason)
                 WHERE uuid = ?5 AND status = 'pending'",
                params![status.to_string(), now, executed_at, reason, uuid],
            )
            .map_err(|e| DomainError::Database(format!("Failed to mark recommendation {status}: {e}")))?;
        if rows == 0 {
            return Err(Self::missing_or_terminal(&conn, uuid)?);
        }
        Ok(())
    }

    fn missing_or_terminal(conn: &Connection, uuid: &str) -> Result<DomainError, DomainError> {
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM recommendations WHERE uuid = ?1",
                params![uuid],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(match status {
            Some(status) => DomainError::InvalidInput(format!("Recommendation {uuid} is {status}, not pending")),
            None => DomainError::NotFound(format!("Recommendation not found: {uuid}")),
        })
    }

    /// Dedupe-or-insert on an open connection or transaction.
    fn upsert(conn: &Connection, draft: RecommendationDraft, now: DateTime<Utc>) -> Result<String, DomainError> {
        let existing: Option<String> = conn
            .query_row(
                "SELECT uuid FROM recommendations
                 WHERE symbol = ?1 AND side = ?2 AND reason = ?3 AND portfolio_hash = ?4 AND status = 'pending'
                 ORDER BY created_at LIMIT 1",
                params![draft.symbol, draft.side.to_string(), draft.reason, draft.portfolio_hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DomainError::Database(format!("Failed to look up recommendation: {e}")))?;

        if let Some(uuid) = existing {
            conn.execute(
                "UPDATE recommendations
                 SET name = ?1, quantity = ?2, estimated_price = ?3, estimated_value = ?4, currency = ?5,
                     priority = ?6, current_portfolio_score = ?7, new_portfolio_score = ?8, score_change = ?9,
                     updated_at = ?10
                 WHERE uuid = ?11",
                params![
                    draft.name,
                    draft.quantity,
                    draft.estimated_price,
                    draft.estimated_value,
                    draft.currency,
                    draft.priority,
                    draft.current_portfolio_score,
                    draft.new_portfolio_score,
                    draft.new_portfolio_score - draft.current_portfolio_score,
                    ts(now),
                    uuid,
                ],
            )
            .map_err(|e| DomainError::Database(format!("Failed to update recommendation: {e}")))?;
            return Ok(uuid);
        }

        let rec = Recommendation::from_draft(draft, now);
        conn.execute(
            &format!(
                "INSERT INTO recommendations ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
            ),
            params![
                rec.uuid,
                rec.symbol,
                rec.name,
                rec.side.to_string(),
                rec.quantity,
                rec.estimated_price,
                rec.estimated_value,
                rec.reason,
                rec.currency,
                rec.priority,
                rec.current_portfolio_score,
                rec.new_portfolio_score,
                rec.score_change,
                rec.status.to_string(),
                rec.portfolio_hash,
                rec.retry_count,
                rec.last_attempt_at.map(ts),
                rec.failure_reason,
                ts(rec.created_at),
                ts(rec.updated_at),
                rec.executed_at.map(ts),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to insert recommendation: {e}")))?;
        Ok(rec.uuid)
    }

    fn dismiss_pending(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DomainError> {
        conn.execute(
            "UPDATE recommendations SET status = 'dismissed', updated_at = ?1 WHERE status = 'pending'",
            params![ts(now)],
        )
        .map_err(|e| DomainError::Database(format!("Failed to dismiss pending recommendations: {e}")))
    }

    fn store_audit<T: Serialize>(&self, portfolio_hash: &str, kind: &str, value: &T) -> Result<(), DomainError> {
        let payload = serde_json::to_string(value)
            .map_err(|e| DomainError::Serialization(format!("Failed to encode {kind}: {e}")))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO planner_audit (portfolio_hash, kind, payload, stored_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(portfolio_hash, kind) DO UPDATE SET payload = excluded.payload, stored_at = excluded.stored_at",
            params![portfolio_hash, kind, payload, ts(self.clock.now())],
        )
        .map_err(|e| DomainError::Database(format!("Failed to store {kind}: {e}")))?;

        let evicted = conn
            .execute(
                "DELETE FROM planner_audit WHERE portfolio_hash NOT IN (
                     SELECT portfolio_hash FROM planner_audit
                     GROUP BY portfolio_hash ORDER BY MAX(stored_at) DESC LIMIT ?1
                 )",
                params![self.audit_capacity as i64],
            )
            .map_err(|e| DomainError::Database(format!("Failed to bound audit log: {e}")))?;
        if evicted > 0 {
            debug!(evicted, "Evicted audit rows beyond capacity");
        }
        Ok(())
    }

    fn load_audit<T: DeserializeOwned>(&self, portfolio_hash: &str, kind: &str) -> Result<Option<T>, DomainError> {
        let conn = self.lock()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM planner_audit WHERE portfolio_hash = ?1 AND kind = ?2",
                params![portfolio_hash, kind],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DomainError::Database(format!("Failed to load {kind}: {e}")))?;
        payload
            .map(|p| {
                serde_json::from_str(&p)
                    .map_err(|e| DomainError::Serialization(format!("Failed to decode {kind}: {e}")))
            })
            .transpose()
    }
}

impl RecommendationRepository for SqliteRecommendationRepo {
    fn create_or_update(&self, draft: RecommendationDraft) -> Result<String, DomainError> {
        let conn = self.lock()?;
        Self::upsert(&conn, draft, self.clock.now())
    }

    /// Dismissal and inserts share one transaction, so a failed step leaves the
    /// previous plan pending.
    fn store_plan(&self, plan: &HolisticPlan, portfolio_hash: &str) -> Result<usize, DomainError> {
        let mut conn = self.lock()?;
        let now = self.clock.now();
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::Database(format!("Failed to begin plan transaction: {e}")))?;

        log_dismissal(Self::dismiss_pending(&tx, now));
        for (idx, draft) in plan_drafts(plan, portfolio_hash).into_iter().enumerate() {
            Self::upsert(&tx, draft, now).map_err(|e| step_error(idx, e))?;
        }
        tx.commit()
            .map_err(|e| DomainError::Database(format!("Failed to commit plan: {e}")))?;

        log_stored(plan, portfolio_hash);
        Ok(plan.steps.len())
    }

    fn get_recommendation(&self, uuid: &str) -> Result<Option<Recommendation>, DomainError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {COLUMNS} FROM recommendations WHERE uuid = ?1");
        Ok(Self::query_recommendations(&conn, &sql, params![uuid])?.into_iter().next())
    }

    fn find_matching_for_execution(
        &self,
        symbol: &str,
        side: TradeSide,
        portfolio_hash: &str,
    ) -> Result<Vec<Recommendation>, DomainError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM recommendations
             WHERE symbol = ?1 AND side = ?2 AND portfolio_hash = ?3 AND status = 'pending'
             ORDER BY priority, created_at, rowid"
        );
        let side = side.to_string();
        Self::query_recommendations(&conn, &sql, params![symbol, side, portfolio_hash])
    }

    fn mark_executed(&self, uuid: &str) -> Result<(), DomainError> {
        self.finish(uuid, RecommendationStatus::Executed, None)
    }

    fn record_failed_attempt(&self, uuid: &str, reason: &str) -> Result<(), DomainError> {
        let conn = self.lock()?;
        let now = ts(self.clock.now());
        let rows = conn
            .execute(
                "UPDATE recommendations
                 SET retry_count = retry_count + 1, last_attempt_at = ?1, failure_reason = ?2, updated_at = ?1
                 WHERE uuid = ?3",
                params![now, reason, uuid],
            )
            .map_err(|e| DomainError::Database(format!("Failed to record failed attempt: {e}")))?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Recommendation not found: {uuid}")));
        }
        Ok(())
    }

    fn mark_failed(&self, uuid: &str, reason: &str) -> Result<(), DomainError> {
        self.finish(uuid, RecommendationStatus::Failed, Some(reason))
    }

    fn dismiss_all_pending(&self) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        Self::dismiss_pending(&conn, self.clock.now())
    }

    fn dismiss_all_by_portfolio_hash(&self, portfolio_hash: &str) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE recommendations SET status = 'dismissed', updated_at = ?1
             WHERE status = 'pending' AND portfolio_hash = ?2",
            params![ts(self.clock.now()), portfolio_hash],
        )
        .map_err(|e| DomainError::Database(format!("Failed to dismiss recommendations: {e}")))
    }

    fn get_pending_recommendations(&self, limit: i64) -> Result<Vec<Recommendation>, DomainError> {
        let conn = self.lock()?;
        let mut sql = format!(
            "SELECT {COLUMNS} FROM recommendations WHERE status = 'pending' ORDER BY priority, created_at, rowid"
        );
        if limit > 0 {
            sql.push_str(" LIMIT ?1");
            return Self::query_recommendations(&conn, &sql, params![limit]);
        }
        Self::query_recommendations(&conn, &sql, params![])
    }

    fn count_pending_by_side(&self) -> Result<PendingCounts, DomainError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT side, COUNT(*) FROM recommendations WHERE status = 'pending' GROUP BY side")
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| DomainError::Database(e.to_string()))?;

        let mut counts = PendingCounts::default();
        for row in rows {
            let (side, n) = row.map_err(|e| DomainError::Database(e.to_string()))?;
            match side.parse::<TradeSide>() {
                Ok(TradeSide::Buy) => counts.buy = n as usize,
                Ok(TradeSide::Sell) => counts.sell = n as usize,
                Err(e) => warn!(error = %e, "Skipping pending recommendations with unknown side"),
            }
        }
        Ok(counts)
    }

    fn delete_older_than(&self, max_age: Duration) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        let cutoff = ts(self.clock.now() - max_age);
        conn.execute("DELETE FROM recommendations WHERE created_at < ?1", params![cutoff])
            .map_err(|e| DomainError::Database(format!("Failed to delete old recommendations: {e}")))
    }

    fn store_rejected_opportunities(
        &self,
        portfolio_hash: &str,
        rejected: Vec<RejectedOpportunity>,
    ) -> Result<(), DomainError> {
        self.store_audit(portfolio_hash, KIND_REJECTED_OPPORTUNITIES, &rejected)
    }

    fn get_rejected_opportunities(&self, portfolio_hash: &str) -> Result<Vec<RejectedOpportunity>, DomainError> {
        Ok(self
            .load_audit(portfolio_hash, KIND_REJECTED_OPPORTUNITIES)?
            .unwrap_or_default())
    }

    fn store_pre_filtered_securities(
        &self,
        portfolio_hash: &str,
        pre_filtered: Vec<PreFilteredSecurity>,
    ) -> Result<(), DomainError> {
        self.store_audit(portfolio_hash, KIND_PRE_FILTERED, &pre_filtered)
    }

    fn get_pre_filtered_securities(&self, portfolio_hash: &str) -> Result<Vec<PreFilteredSecurity>, DomainError> {
        Ok(self.load_audit(portfolio_hash, KIND_PRE_FILTERED)?.unwrap_or_default())
    }

    fn store_rejected_sequences(
        &self,
        portfolio_hash: &str,
        rejected: Vec<RejectedSequence>,
    ) -> Result<(), DomainError> {
        self.store_audit(portfolio_hash, KIND_REJECTED_SEQUENCES, &rejected)
    }

    fn get_rejected_sequences(&self, portfolio_hash: &str) -> Result<Vec<RejectedSequence>, DomainError> {
        Ok(self
            .load_audit(portfolio_hash, KIND_REJECTED_SEQUENCES)?
            .unwrap_or_default())
    }

    fn store_evaluated_count(&self, portfolio_hash: &str, count: usize) -> Result<(), DomainError> {
        self.store_audit(portfolio_hash, KIND_EVALUATED_COUNT, &count)
    }

    fn get_evaluated_count(&self, portfolio_hash: &str) -> Result<Option<usize>, DomainError> {
        self.load_audit(portfolio_hash, KIND_EVALUATED_COUNT)
    }

    fn prune_audit_older_than(&self, max_age: Duration) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        let cutoff = ts(self.clock.now() - max_age);
        conn.execute("DELETE FROM planner_audit WHERE stored_at < ?1", params![cutoff])
            .map_err(|e| DomainError::Database(format!("Failed to prune audit log: {e}")))
    }

    fn latest_audit_hash(&self) -> Result<Option<String>, DomainError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT portfolio_hash FROM planner_audit ORDER BY stored_at DESC, rowid DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| DomainError::Database(format!("Failed to find latest audit entry: {e}")))
    }
}
