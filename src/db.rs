// ==========================================
// Roofline Ops - SQLite connection setup
// ==========================================
// Goals:
// - one place for Connection::open PRAGMA behavior (foreign keys, busy_timeout)
// - one place for schema creation, shared by the binary and the tests
// Nested collections (line items, status history, notify roles, discrepancies)
// are stored as JSON columns; encoding happens in the repository layer only.
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// Default busy_timeout (milliseconds).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema version the code expects. Used to warn, not to auto-migrate.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Apply the unified PRAGMA set to a connection.
///
/// foreign_keys and busy_timeout are per-connection settings.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the unified configuration applied.
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Read the schema version (None when the table does not exist yet).
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// Create all tables. Idempotent; used by the binary on startup and by the
/// test helpers for temp databases.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS ticket (
            ticket_id TEXT PRIMARY KEY,
            ticket_type TEXT NOT NULL,
            current_stage TEXT NOT NULL,
            stage_entered_at TEXT NOT NULL,
            assigned_to TEXT,
            line_items TEXT NOT NULL,
            urgent INTEGER NOT NULL DEFAULT 0,
            has_issues INTEGER NOT NULL DEFAULT 0,
            requires_approval INTEGER NOT NULL DEFAULT 0,
            job_id TEXT NOT NULL,
            job_name TEXT,
            address TEXT NOT NULL,
            requested_date TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_ticket_stage ON ticket(current_stage);
        CREATE INDEX IF NOT EXISTS idx_ticket_job ON ticket(job_id);

        CREATE TABLE IF NOT EXISTS billing_record (
            billing_id TEXT PRIMARY KEY,
            ticket_id TEXT,
            job_id TEXT,
            transaction_type TEXT NOT NULL,
            billing_status TEXT NOT NULL,
            lines TEXT NOT NULL,
            total_cost REAL NOT NULL,
            total_charge REAL NOT NULL,
            markup_pct REAL NOT NULL,
            requires_approval INTEGER NOT NULL DEFAULT 0,
            approval_reason TEXT,
            approved_by TEXT,
            approved_at TEXT,
            billed_by TEXT,
            billed_at TEXT,
            billing_deadline TEXT,
            customer_payment_status TEXT NOT NULL,
            vendor_payment_status TEXT,
            vendor TEXT,
            status_history TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_billing_status ON billing_record(billing_status);
        CREATE INDEX IF NOT EXISTS idx_billing_job ON billing_record(job_id);

        CREATE TABLE IF NOT EXISTS alert (
            alert_id TEXT PRIMARY KEY,
            alert_type TEXT NOT NULL,
            severity TEXT NOT NULL,
            ticket_id TEXT,
            billing_id TEXT,
            job_id TEXT,
            context_key TEXT,
            message TEXT NOT NULL,
            notify_roles TEXT NOT NULL,
            created_at TEXT NOT NULL,
            acknowledged_at TEXT,
            acknowledged_by TEXT,
            resolved_at TEXT,
            resolved_by TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_alert_active
            ON alert(alert_type, ticket_id, billing_id) WHERE resolved_at IS NULL;

        CREATE TABLE IF NOT EXISTS vendor_purchase (
            purchase_id TEXT PRIMARY KEY,
            vendor TEXT NOT NULL,
            job_id TEXT,
            billed_to_job INTEGER NOT NULL DEFAULT 0,
            amount REAL NOT NULL,
            payment_status TEXT NOT NULL,
            payment_due TEXT,
            purchased_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reconciliation_report (
            report_id TEXT PRIMARY KEY,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            generated_at TEXT NOT NULL,
            generated_by TEXT NOT NULL,
            delivery_count INTEGER NOT NULL,
            delivery_total REAL NOT NULL,
            return_count INTEGER NOT NULL,
            return_total REAL NOT NULL,
            vendor_purchase_count INTEGER NOT NULL,
            vendor_purchase_total REAL NOT NULL,
            discrepancies TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
