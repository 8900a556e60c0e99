// ==========================================
// Roofline Ops - alert entity
// ==========================================
// Alerts are created by the SLA monitor, billing engine and reconciliation
// engine. They are resolved explicitly by a human actor, never auto-deleted.
// ==========================================

use crate::domain::types::{AlertSeverity, AlertType, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub ticket_id: Option<String>,
    pub billing_id: Option<String>,
    pub job_id: Option<String>,
    /// Secondary dedup key, e.g. the stage for SLA alerts or the product for
    /// low-stock alerts. At most one active alert per (type, entity, key).
    pub context_key: Option<String>,
    pub message: String,
    pub notify_roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

impl Alert {
    pub fn new(
        alert_id: String,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id,
            alert_type,
            severity,
            ticket_id: None,
            billing_id: None,
            job_id: None,
            context_key: None,
            message,
            notify_roles: vec![Role::Admin],
            created_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            resolved_by: None,
        }
    }

    pub fn with_ticket(mut self, ticket_id: &str) -> Self {
        self.ticket_id = Some(ticket_id.to_string());
        self
    }

    pub fn with_billing(mut self, billing_id: &str) -> Self {
        self.billing_id = Some(billing_id.to_string());
        self
    }

    pub fn with_job(mut self, job_id: &str) -> Self {
        self.job_id = Some(job_id.to_string());
        self
    }

    pub fn with_context_key(mut self, key: &str) -> Self {
        self.context_key = Some(key.to_string());
        self
    }

    pub fn with_notify_roles(mut self, roles: Vec<Role>) -> Self {
        self.notify_roles = roles;
        self
    }

    /// An alert is active until a human resolves it.
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}
