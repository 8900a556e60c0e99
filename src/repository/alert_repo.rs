// ==========================================
// Roofline Ops - alert repository
// ==========================================
// Append-only store for alerts. Alerts are acknowledged and resolved in
// place, never deleted. find_active backs the one-active-alert-per-key
// dedup rule used by the monitors.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::alert::Alert;
use crate::domain::types::{AlertSeverity, AlertType, Role};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{invalid_col, json_col};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct AlertRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AlertRepository {
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

    pub fn insert(&self, alert: &Alert) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let notify_roles: Vec<&str> = alert.notify_roles.iter().map(|r| r.to_db_str()).collect();
        conn.execute(
            r#"
            INSERT INTO alert (
                alert_id, alert_type, severity, ticket_id, billing_id, job_id,
                context_key, message, notify_roles, created_at,
                acknowledged_at, acknowledged_by, resolved_at, resolved_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                alert.alert_id,
                alert.alert_type.to_db_str(),
                alert.severity.to_db_str(),
                alert.ticket_id,
                alert.billing_id,
                alert.job_id,
                alert.context_key,
                alert.message,
                serde_json::to_string(&notify_roles)?,
                alert.created_at,
                alert.acknowledged_at,
                alert.acknowledged_by,
                alert.resolved_at,
                alert.resolved_by,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, alert_id: &str) -> RepositoryResult<Alert> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM alert WHERE alert_id = ?1", COLUMNS),
            params![alert_id],
            row_to_alert,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Alert".to_string(),
                id: alert_id.to_string(),
            },
            other => other.into(),
        })
    }

    pub fn list_active(&self) -> RepositoryResult<Vec<Alert>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM alert WHERE resolved_at IS NULL ORDER BY created_at",
            COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_alert)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    /// Look up an unresolved alert by its dedup key: type plus whichever of
    /// ticket/billing id applies, plus an optional context key (stage,
    /// product, ...).
    pub fn find_active(
        &self,
        alert_type: AlertType,
        ticket_id: Option<&str>,
        billing_id: Option<&str>,
        context_key: Option<&str>,
    ) -> RepositoryResult<Option<Alert>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"SELECT {} FROM alert
               WHERE resolved_at IS NULL
                 AND alert_type = ?1
                 AND (?2 IS NULL AND ticket_id IS NULL OR ticket_id = ?2)
                 AND (?3 IS NULL AND billing_id IS NULL OR billing_id = ?3)
                 AND (?4 IS NULL AND context_key IS NULL OR context_key = ?4)
               LIMIT 1"#,
            COLUMNS
        ))?;
        let mut rows = stmt.query_map(
            params![alert_type.to_db_str(), ticket_id, billing_id, context_key],
            row_to_alert,
        )?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn acknowledge(
        &self,
        alert_id: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE alert SET acknowledged_at = ?1, acknowledged_by = ?2 WHERE alert_id = ?3",
            params![now, actor, alert_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Alert".to_string(),
                id: alert_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn resolve(&self, alert_id: &str, actor: &str, now: DateTime<Utc>) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE alert SET resolved_at = ?1, resolved_by = ?2 WHERE alert_id = ?3",
            params![now, actor, alert_id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Alert".to_string(),
                id: alert_id.to_string(),
            });
        }
        Ok(())
    }
}

const COLUMNS: &str = "alert_id, alert_type, severity, ticket_id, billing_id, job_id, \
     context_key, message, notify_roles, created_at, acknowledged_at, acknowledged_by, \
     resolved_at, resolved_by";

fn row_to_alert(row: &Row<'_>) -> rusqlite::Result<Alert> {
    let type_raw: String = row.get(1)?;
    let alert_type = AlertType::from_str(&type_raw)
        .ok_or_else(|| invalid_col(1, format!("unknown alert type: {}", type_raw)))?;
    let sev_raw: String = row.get(2)?;
    let severity = AlertSeverity::from_str(&sev_raw)
        .ok_or_else(|| invalid_col(2, format!("unknown severity: {}", sev_raw)))?;
    let roles_raw: Vec<String> = json_col(row, 8)?;
    let mut notify_roles = Vec::new();
    for raw in roles_raw {
        notify_roles.push(
            Role::from_str(&raw).ok_or_else(|| invalid_col(8, format!("unknown role: {}", raw)))?,
        );
    }

    Ok(Alert {
        alert_id: row.get(0)?,
        alert_type,
        severity,
        ticket_id: row.get(3)?,
        billing_id: row.get(4)?,
        job_id: row.get(5)?,
        context_key: row.get(6)?,
        message: row.get(7)?,
        notify_roles,
        created_at: row.get(9)?,
        acknowledged_at: row.get(10)?,
        acknowledged_by: row.get(11)?,
        resolved_at: row.get(12)?,
        resolved_by: row.get(13)?,
    })
}
