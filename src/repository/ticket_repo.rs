// ==========================================
// Roofline Ops - ticket repository
// ==========================================
// Manages the ticket table. Tickets are never deleted; terminal stages are
// the only end of life. Writes go through update_with_revision so concurrent
// writers against a stale revision lose cleanly.
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::ticket::{LineItem, Ticket};
use crate::domain::types::{TicketStage, TicketType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{invalid_col, json_col};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct TicketRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TicketRepository {
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

    pub fn insert(&self, ticket: &Ticket) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO ticket (
                ticket_id, ticket_type, current_stage, stage_entered_at,
                assigned_to, line_items, urgent, has_issues, requires_approval,
                job_id, job_name, address, requested_date,
                created_by, created_at, updated_at, revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                ticket.ticket_id,
                ticket.ticket_type.to_db_str(),
                ticket.current_stage.to_db_str(),
                serde_json::to_string(&stage_map_to_db(&ticket.stage_entered_at))?,
                ticket.assigned_to,
                serde_json::to_string(&ticket.line_items)?,
                ticket.urgent as i64,
                ticket.has_issues as i64,
                ticket.requires_approval as i64,
                ticket.job_id,
                ticket.job_name,
                ticket.address,
                ticket.requested_date,
                ticket.created_by,
                ticket.created_at,
                ticket.updated_at,
                ticket.revision,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, ticket_id: &str) -> RepositoryResult<Ticket> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("SELECT {} FROM ticket WHERE ticket_id = ?1", COLUMNS),
            params![ticket_id],
            row_to_ticket,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Ticket".to_string(),
                id: ticket_id.to_string(),
            },
            other => other.into(),
        })
    }

    /// Write back a mutated ticket. `ticket.revision` must hold the revision
    /// the mutation was based on; the row is written with revision + 1.
    /// A stale writer gets OptimisticLockFailure and no row change.
    pub fn update_with_revision(&self, ticket: &Ticket) -> RepositoryResult<Ticket> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE ticket SET
                current_stage = ?1, stage_entered_at = ?2, assigned_to = ?3,
                line_items = ?4, urgent = ?5, has_issues = ?6,
                requires_approval = ?7, updated_at = ?8, revision = revision + 1
            WHERE ticket_id = ?9 AND revision = ?10
            "#,
            params![
                ticket.current_stage.to_db_str(),
                serde_json::to_string(&stage_map_to_db(&ticket.stage_entered_at))?,
                ticket.assigned_to,
                serde_json::to_string(&ticket.line_items)?,
                ticket.urgent as i64,
                ticket.has_issues as i64,
                ticket.requires_approval as i64,
                ticket.updated_at,
                ticket.ticket_id,
                ticket.revision,
            ],
        )?;

        if changed == 0 {
            let actual: Option<i64> = conn
                .query_row(
                    "SELECT revision FROM ticket WHERE ticket_id = ?1",
                    params![ticket.ticket_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            return match actual {
                Some(actual) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "Ticket".to_string(),
                    id: ticket.ticket_id.clone(),
                    expected: ticket.revision,
                    actual,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "Ticket".to_string(),
                    id: ticket.ticket_id.clone(),
                }),
            };
        }

        let mut updated = ticket.clone();
        updated.revision += 1;
        Ok(updated)
    }

    /// All tickets not yet in a terminal stage.
    pub fn list_active(&self) -> RepositoryResult<Vec<Ticket>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ticket WHERE current_stage NOT IN ('COMPLETED', 'CANCELLED') ORDER BY created_at",
            COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_ticket)?;
        let mut tickets = Vec::new();
        for row in rows {
            tickets.push(row?);
        }
        Ok(tickets)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Ticket>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM ticket ORDER BY created_at", COLUMNS))?;
        let rows = stmt.query_map([], row_to_ticket)?;
        let mut tickets = Vec::new();
        for row in rows {
            tickets.push(row?);
        }
        Ok(tickets)
    }
}

const COLUMNS: &str = "ticket_id, ticket_type, current_stage, stage_entered_at, assigned_to, \
     line_items, urgent, has_issues, requires_approval, job_id, job_name, address, \
     requested_date, created_by, created_at, updated_at, revision";

fn stage_map_to_db(
    map: &HashMap<TicketStage, DateTime<Utc>>,
) -> HashMap<&'static str, DateTime<Utc>> {
    map.iter().map(|(k, v)| (k.to_db_str(), *v)).collect()
}

fn row_to_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let type_raw: String = row.get(1)?;
    let ticket_type = TicketType::from_str(&type_raw)
        .ok_or_else(|| invalid_col(1, format!("unknown ticket type: {}", type_raw)))?;
    let stage_raw: String = row.get(2)?;
    let current_stage = TicketStage::from_str(&stage_raw)
        .ok_or_else(|| invalid_col(2, format!("unknown ticket stage: {}", stage_raw)))?;

    let stage_map_raw: HashMap<String, DateTime<Utc>> = json_col(row, 3)?;
    let mut stage_entered_at = HashMap::new();
    for (key, value) in stage_map_raw {
        let stage = TicketStage::from_str(&key)
            .ok_or_else(|| invalid_col(3, format!("unknown ticket stage: {}", key)))?;
        stage_entered_at.insert(stage, value);
    }

    let line_items: Vec<LineItem> = json_col(row, 5)?;
    let requested_date: Option<NaiveDate> = row.get(12)?;

    Ok(Ticket {
        ticket_id: row.get(0)?,
        ticket_type,
        current_stage,
        stage_entered_at,
        assigned_to: row.get(4)?,
        line_items,
        urgent: row.get::<_, i64>(6)? != 0,
        has_issues: row.get::<_, i64>(7)? != 0,
        requires_approval: row.get::<_, i64>(8)? != 0,
        job_id: row.get(9)?,
        job_name: row.get(10)?,
        address: row.get(11)?,
        requested_date,
        created_by: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        revision: row.get(16)?,
    })
}
