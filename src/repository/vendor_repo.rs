// ==========================================
// Roofline Ops - vendor purchase repository
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::VendorPaymentStatus;
use crate::domain::vendor::VendorPurchase;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::invalid_col;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct VendorPurchaseRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VendorPurchaseRepository {
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

    pub fn insert(&self, purchase: &VendorPurchase) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO vendor_purchase (
                purchase_id, vendor, job_id, billed_to_job, amount,
                payment_status, payment_due, purchased_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                purchase.purchase_id,
                purchase.vendor,
                purchase.job_id,
                purchase.billed_to_job as i64,
                purchase.amount,
                purchase.payment_status.to_db_str(),
                purchase.payment_due,
                purchase.purchased_at,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, purchase_id: &str) -> RepositoryResult<VendorPurchase> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM vendor_purchase WHERE purchase_id = ?1", COLUMNS),
            params![purchase_id],
            row_to_purchase,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "VendorPurchase".to_string(),
                id: purchase_id.to_string(),
            },
            other => other.into(),
        })
    }

    /// Pending purchases whose payment due date has passed.
    pub fn list_pending_due(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<VendorPurchase>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM vendor_purchase
               WHERE payment_status = 'PENDING'
                 AND payment_due IS NOT NULL AND payment_due < ?1
               ORDER BY payment_due"#,
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![now], row_to_purchase)?;
        collect(rows)
    }

    pub fn list_in_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepositoryResult<Vec<VendorPurchase>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM vendor_purchase WHERE purchased_at >= ?1 AND purchased_at <= ?2 ORDER BY purchase_id",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![start, end], row_to_purchase)?;
        collect(rows)
    }
}

const COLUMNS: &str =
    "purchase_id, vendor, job_id, billed_to_job, amount, payment_status, payment_due, purchased_at";

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<VendorPurchase>>,
) -> RepositoryResult<Vec<VendorPurchase>> {
    let mut purchases = Vec::new();
    for row in rows {
        purchases.push(row?);
    }
    Ok(purchases)
}

fn row_to_purchase(row: &Row<'_>) -> rusqlite::Result<VendorPurchase> {
    let status_raw: String = row.get(5)?;
    let payment_status = VendorPaymentStatus::from_str(&status_raw)
        .ok_or_else(|| invalid_col(5, format!("unknown vendor payment status: {}", status_raw)))?;

    Ok(VendorPurchase {
        purchase_id: row.get(0)?,
        vendor: row.get(1)?,
        job_id: row.get(2)?,
        billed_to_job: row.get::<_, i64>(3)? != 0,
        amount: row.get(4)?,
        payment_status,
        payment_due: row.get(6)?,
        purchased_at: row.get(7)?,
    })
}
