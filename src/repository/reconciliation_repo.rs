// ==========================================
// Roofline Ops - reconciliation report repository
// ==========================================
// Archive for immutable reconciliation reports. Insert and read only.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::reconciliation::{Discrepancy, ReconciliationReport};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::json_col;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct ReconciliationReportRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReconciliationReportRepository {
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

    pub fn insert(&self, report: &ReconciliationReport) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO reconciliation_report (
                report_id, period_start, period_end, generated_at, generated_by,
                delivery_count, delivery_total, return_count, return_total,
                vendor_purchase_count, vendor_purchase_total, discrepancies
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                report.report_id,
                report.period_start,
                report.period_end,
                report.generated_at,
                report.generated_by,
                report.delivery_count as i64,
                report.delivery_total,
                report.return_count as i64,
                report.return_total,
                report.vendor_purchase_count as i64,
                report.vendor_purchase_total,
                serde_json::to_string(&report.discrepancies)?,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, report_id: &str) -> RepositoryResult<ReconciliationReport> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM reconciliation_report WHERE report_id = ?1", COLUMNS),
            params![report_id],
            row_to_report,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "ReconciliationReport".to_string(),
                id: report_id.to_string(),
            },
            other => other.into(),
        })
    }

    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ReconciliationReport>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reconciliation_report ORDER BY generated_at DESC LIMIT ?1",
            COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], row_to_report)?;
        let mut reports = Vec::new();
        for row in rows {
            reports.push(row?);
        }
        Ok(reports)
    }
}

const COLUMNS: &str = "report_id, period_start, period_end, generated_at, generated_by, \
     delivery_count, delivery_total, return_count, return_total, \
     vendor_purchase_count, vendor_purchase_total, discrepancies";

fn row_to_report(row: &Row<'_>) -> rusqlite::Result<ReconciliationReport> {
    let discrepancies: Vec<Discrepancy> = json_col(row, 11)?;
    Ok(ReconciliationReport {
        report_id: row.get(0)?,
        period_start: row.get(1)?,
        period_end: row.get(2)?,
        generated_at: row.get(3)?,
        generated_by: row.get(4)?,
        delivery_count: row.get::<_, i64>(5)? as usize,
        delivery_total: row.get(6)?,
        return_count: row.get::<_, i64>(7)? as usize,
        return_total: row.get(8)?,
        vendor_purchase_count: row.get::<_, i64>(9)? as usize,
        vendor_purchase_total: row.get(10)?,
        discrepancies,
    })
}
