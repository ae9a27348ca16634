use rusqlite::Connection;

use crate::domain::error::DomainError;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS recommendations (
            uuid TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            side TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            estimated_price REAL NOT NULL,
            estimated_value REAL NOT NULL,
            reason TEXT NOT NULL DEFAULT '',
            currency TEXT NOT NULL DEFAULT 'EUR',
            priority REAL NOT NULL DEFAULT 0,
            current_portfolio_score REAL NOT NULL DEFAULT 0,
            new_portfolio_score REAL NOT NULL DEFAULT 0,
            score_change REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            portfolio_hash TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_attempt_at TEXT,
            failure_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            executed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS planner_audit (
            portfolio_hash TEXT NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            stored_at TEXT NOT NULL,
            PRIMARY KEY (portfolio_hash, kind)
        );

        CREATE INDEX IF NOT EXISTS idx_recommendations_status_priority ON recommendations(status, priority);
        CREATE INDEX IF NOT EXISTS idx_recommendations_portfolio_hash ON recommendations(portfolio_hash);
        CREATE INDEX IF NOT EXISTS idx_recommendations_created ON recommendations(created_at);
        CREATE INDEX IF NOT EXISTS idx_planner_audit_stored ON planner_audit(stored_at);
        "
    ).map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}
