// ==========================================
// Roofline Ops - billing record repository
// ==========================================
// Manages the billing_record table. Records are never deleted. Lines and
// status history are JSON columns; this is the only place they are encoded.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::billing::{BillingRecord, MaterialLine, StatusHistoryEntry};
use crate::domain::types::{
    BillingStatus, CustomerPaymentStatus, TransactionType, VendorPaymentStatus,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{invalid_col, json_col};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct BillingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BillingRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, record: &BillingRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO billing_record (
                billing_id, ticket_id, job_id, transaction_type, billing_status,
                lines, total_cost, total_charge, markup_pct,
                requires_approval, approval_reason,
                approved_by, approved_at, billed_by, billed_at, billing_deadline,
                customer_payment_status, vendor_payment_status, vendor,
                status_history, created_by, created_at, updated_at, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
            "#,
            params![
                record.billing_id,
                record.ticket_id,
                record.job_id,
                record.transaction_type.to_db_str(),
                record.billing_status.to_db_str(),
                serde_json::to_string(&record.lines)?,
                record.total_cost,
                record.total_charge,
                record.markup_pct,
                record.requires_approval as i64,
                record.approval_reason,
                record.approved_by,
                record.approved_at,
                record.billed_by,
                record.billed_at,
                record.billing_deadline,
                record.customer_payment_status.to_db_str(),
                record.vendor_payment_status.map(|s| s.to_db_str()),
                record.vendor,
                serde_json::to_string(&record.status_history)?,
                record.created_by,
                record.created_at,
                record.updated_at,
                record.revision,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, billing_id: &str) -> RepositoryResult<BillingRecord> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM billing_record WHERE billing_id = ?1", COLUMNS),
            params![billing_id],
            row_to_record,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "BillingRecord".to_string(),
                id: billing_id.to_string(),
            },
            other => other.into(),
        })
    }

    /// Write back a mutated record based on `record.revision`; stale writers
    /// get OptimisticLockFailure without touching the row.
    pub fn update_with_revision(&self, record: &BillingRecord) -> RepositoryResult<BillingRecord> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE billing_record SET
                billing_status = ?1, approval_reason = ?2,
                approved_by = ?3, approved_at = ?4,
                billed_by = ?5, billed_at = ?6, billing_deadline = ?7,
                customer_payment_status = ?8, vendor_payment_status = ?9,
                status_history = ?10, updated_at = ?11, revision = revision + 1
            WHERE billing_id = ?12 AND revision = ?13
            "#,
            params![
                record.billing_status.to_db_str(),
                record.approval_reason,
                record.approved_by,
                record.approved_at,
                record.billed_by,
                record.billed_at,
                record.billing_deadline,
                record.customer_payment_status.to_db_str(),
                record.vendor_payment_status.map(|s| s.to_db_str()),
                serde_json::to_string(&record.status_history)?,
                record.updated_at,
                record.billing_id,
                record.revision,
            ],
        )?;

        if changed == 0 {
            let actual: Option<i64> = conn
                .query_row(
                    "SELECT revision FROM billing_record WHERE billing_id = ?1",
                    params![record.billing_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            return match actual {
                Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "BillingRecord".to_string(),
                    id: record.billing_id.clone(),
                    expected: record.revision,
                    actual,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "BillingRecord".to_string(),
                    id: record.billing_id.clone(),
                }),
            };
        }

        let mut updated = record.clone();
        updated.revision += 1;
        Ok(updated)
    }

    pub fn list_by_status(&self, status: BillingStatus) -> RepositoryResult<Vec<BillingRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM billing_record WHERE billing_status = ?1 ORDER BY created_at",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![status.to_db_str()], row_to_record)?;
        collect(rows)
    }

    /// Unbilled records whose billing deadline has passed.
    pub fn list_unbilled_overdue(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<BillingRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM billing_record
               WHERE customer_payment_status = 'UNBILLED'
                 AND billing_deadline IS NOT NULL AND billing_deadline < ?1
               ORDER BY billing_deadline"#,
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![now], row_to_record)?;
        collect(rows)
    }

    /// Records created inside the given period (inclusive bounds).
    pub fn list_in_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<BillingRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM billing_record WHERE created_at >= ?1 AND created_at <= ?2 ORDER BY billing_id",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![start, end], row_to_record)?;
        collect(rows)
    }
}

const COLUMNS: &str = "billing_id, ticket_id, job_id, transaction_type, billing_status, lines, \
     total_cost, total_charge, markup_pct, requires_approval, approval_reason, approved_by, \
     approved_at, billed_by, billed_at, billing_deadline, customer_payment_status, \
     vendor_payment_status, vendor, status_history, created_by, created_at, updated_at, revision";

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<BillingRecord>>,
) -> RepositoryResult<Vec<BillingRecord>> {
    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<BillingRecord> {
    let tx_raw: String = row.get(3)?;
    let transaction_type = TransactionType::from_str(&tx_raw)
        .ok_or_else(|| invalid_col(3, format!("unknown transaction type: {}", tx_raw)))?;
    let status_raw: String = row.get(4)?;
    let billing_status = BillingStatus::from_str(&status_raw)
        .ok_or_else(|| invalid_col(4, format!("unknown billing status: {}", status_raw)))?;
    let lines: Vec<MaterialLine> = json_col(row, 5)?;
    let cps_raw: String = row.get(16)?;
    let customer_payment_status = CustomerPaymentStatus::from_str(&cps_raw)
        .ok_or_else(|| invalid_col(16, format!("unknown payment status: {}", cps_raw)))?;
    let vps_raw: Option<String> = row.get(17)?;
    let vendor_payment_status = match vps_raw {
        Some(raw) => Some(
            VendorPaymentStatus::from_str(&raw)
                .ok_or_else(|| invalid_col(17, format!("unknown vendor payment status: {}", raw)))?,
        ),
        None => None,
    };
    let status_history: Vec<StatusHistoryEntry> = json_col(row, 19)?;

    Ok(BillingRecord {
        billing_id: row.get(0)?,
        ticket_id: row.get(1)?,
        job_id: row.get(2)?,
        transaction_type,
        billing_status,
        lines,
        total_cost: row.get(6)?,
        total_charge: row.get(7)?,
        markup_pct: row.get(8)?,
        requires_approval: row.get::<_, i64>(9)? != 0,
        approval_reason: row.get(10)?,
        approved_by: row.get(11)?,
        approved_at: row.get(12)?,
        billed_by: row.get(13)?,
        billed_at: row.get(14)?,
        billing_deadline: row.get(15)?,
        customer_payment_status,
        vendor_payment_status,
        vendor: row.get(18)?,
        status_history,
        created_by: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
        revision: row.get(23)?,
    })
}
