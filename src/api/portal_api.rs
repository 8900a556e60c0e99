// ==========================================
// Roofline Ops - portal API
// ==========================================
// The single assembly point for the system: owns the repositories, the
// engines and their wiring, and exposes the operations a frontend or batch
// runner calls. Converts engine errors to the flat API error.
// ==========================================

use crate::config::{ConfigManager, OpsConfigReader};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::alert::Alert;
use crate::domain::billing::BillingRecord;
use crate::domain::id::{IdGenerator, UuidIdGenerator};
use crate::domain::permission::Actor;
use crate::domain::reconciliation::ReconciliationReport;
use crate::domain::stage::StageCatalog;
use crate::domain::ticket::{OrderIntake, StageArtifacts, Ticket};
use crate::domain::types::{BillingStatus, TicketStage, TicketType};
use crate::engine::billing::{BillingLifecycleEngine, NewBillingRecord};
use crate::engine::events::{BufferedEventPublisher, TicketEvent};
use crate::engine::notify::{LogNotifier, Notifier};
use crate::engine::reconciliation::ReconciliationEngine;
use crate::engine::sla::{DailyCheckSummary, SlaMonitor};
use crate::engine::ticket_state::TicketStateMachine;
use crate::repository::{
    AlertRepository, BillingRepository, ReconciliationReportRepository, TicketRepository,
    VendorPurchaseRepository,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Result of submitting an order: the ticket plus any screening alert the
/// duplicate check raised. A duplicate warns, it does not block.
#[derive(Debug)]
pub struct OrderSubmission {
    pub ticket: Ticket,
    pub duplicate_alert: Option<Alert>,
}

pub struct PortalApi {
    tickets: Arc<TicketRepository>,
    billing: Arc<BillingRepository>,
    alerts: Arc<AlertRepository>,
    reports: Arc<ReconciliationReportRepository>,
    ticket_engine: TicketStateMachine,
    billing_engine: BillingLifecycleEngine,
    sla_monitor: SlaMonitor,
    reconciliation_engine: ReconciliationEngine,
    events: Arc<BufferedEventPublisher>,
}

impl PortalApi {
    /// Open (or create) the database at `db_path` and wire up the full stack
    /// with the default notifier and id generator.
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        crate::db::init_schema(&conn).map_err(|e| ApiError::Internal(e.to_string()))?;
        Self::from_connection(
            Arc::new(Mutex::new(conn)),
            Arc::new(LogNotifier),
            Arc::new(UuidIdGenerator),
        )
    }

    /// Wire the stack over an existing connection. Tests inject their own
    /// notifier and id generator here.
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<dyn IdGenerator>,
    ) -> ApiResult<Self> {
        let tickets = Arc::new(TicketRepository::from_connection(conn.clone()));
        let billing = Arc::new(BillingRepository::from_connection(conn.clone()));
        let alerts = Arc::new(AlertRepository::from_connection(conn.clone()));
        let vendors = Arc::new(VendorPurchaseRepository::from_connection(conn.clone()));
        let reports = Arc::new(ReconciliationReportRepository::from_connection(conn.clone()));
        let config: Arc<dyn OpsConfigReader> = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| ApiError::Internal(e.to_string()))?,
        );
        let catalog = Arc::new(StageCatalog::builtin());
        let events = Arc::new(BufferedEventPublisher::new());

        let ticket_engine = TicketStateMachine::new(
            tickets.clone(),
            catalog.clone(),
            notifier.clone(),
            ids.clone(),
            events.clone(),
        );
        let billing_engine = BillingLifecycleEngine::new(
            billing.clone(),
            alerts.clone(),
            config.clone(),
            notifier.clone(),
            ids.clone(),
        );
        let sla_monitor = SlaMonitor::new(
            tickets.clone(),
            billing.clone(),
            vendors.clone(),
            alerts.clone(),
            catalog,
            config,
            notifier.clone(),
            ids.clone(),
        );
        let reconciliation_engine = ReconciliationEngine::new(
            billing.clone(),
            vendors,
            reports.clone(),
            alerts.clone(),
            notifier,
            ids,
        );

        Ok(Self {
            tickets,
            billing,
            alerts,
            reports,
            ticket_engine,
            billing_engine,
            sla_monitor,
            reconciliation_engine,
            events,
        })
    }

    // ==========================================
    // Tickets
    // ==========================================

    /// Create a ticket from an order intake. Runs the duplicate screen
    /// first; a hit is reported back alongside the ticket.
    pub async fn submit_order(
        &self,
        ticket_type: TicketType,
        intake: OrderIntake,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ApiResult<OrderSubmission> {
        let duplicate_alert = self.sla_monitor.check_duplicate_order(&intake, now).await?;
        let ticket = self.ticket_engine.create_ticket(ticket_type, intake, actor, now).await?;
        Ok(OrderSubmission {
            ticket,
            duplicate_alert,
        })
    }

    /// Advance a ticket to the target stage, then hand any billable stage
    /// event to the billing engine.
    pub async fn transition_ticket(
        &self,
        ticket_id: &str,
        target: TicketStage,
        actor: &Actor,
        artifacts: &StageArtifacts,
        now: DateTime<Utc>,
    ) -> ApiResult<Ticket> {
        let ticket = self
            .ticket_engine
            .transition(ticket_id, target, actor, artifacts, now)
            .await?;

        // Billing records spawned by stage events are a system action, not
        // something the transitioning actor needs billing rights for.
        let system = Actor::new("system", crate::domain::types::Role::Admin);
        for event in self.events.drain() {
            if let Some(record) = self.dispatch_stage_event(&event, &ticket, &system, now).await? {
                info!(
                    ticket_id = %ticket.ticket_id,
                    billing_id = %record.billing_id,
                    "billing record created from stage event"
                );
            }
        }
        Ok(ticket)
    }

    async fn dispatch_stage_event(
        &self,
        event: &TicketEvent,
        ticket: &Ticket,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<BillingRecord>> {
        let lines = ticket
            .line_items
            .iter()
            .map(|item| {
                crate::domain::billing::MaterialLine {
                    product_id: item.product_id.clone(),
                    description: item.description.clone(),
                    quantity: item.billable_qty(),
                    unit_cost: item.unit_cost,
                    unit_charge: item.unit_charge,
                }
            })
            .collect();
        Ok(self.billing_engine.handle_stage_event(event, lines, actor, now).await?)
    }

    pub fn get_ticket(&self, ticket_id: &str) -> ApiResult<Ticket> {
        Ok(self.tickets.get(ticket_id)?)
    }

    pub fn list_active_tickets(&self) -> ApiResult<Vec<Ticket>> {
        Ok(self.tickets.list_active()?)
    }

    // ==========================================
    // Billing
    // ==========================================

    pub async fn create_billing(
        &self,
        input: NewBillingRecord,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ApiResult<BillingRecord> {
        Ok(self.billing_engine.create_billing_record(input, actor, now).await?)
    }

    pub async fn update_billing_status(
        &self,
        billing_id: &str,
        new_status: BillingStatus,
        actor: &Actor,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> ApiResult<BillingRecord> {
        Ok(self
            .billing_engine
            .update_billing_status(billing_id, new_status, actor, reason, now)
            .await?)
    }

    pub fn get_billing(&self, billing_id: &str) -> ApiResult<BillingRecord> {
        Ok(self.billing.get(billing_id)?)
    }

    // ==========================================
    // Alerts and batch jobs
    // ==========================================

    pub fn list_active_alerts(&self) -> ApiResult<Vec<Alert>> {
        Ok(self.alerts.list_active()?)
    }

    pub async fn acknowledge_alert(
        &self,
        alert_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ApiResult<()> {
        Ok(self.sla_monitor.acknowledge_alert(alert_id, actor, now).await?)
    }

    pub async fn resolve_alert(
        &self,
        alert_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> ApiResult<()> {
        Ok(self.sla_monitor.resolve_alert(alert_id, actor, now).await?)
    }

    pub async fn run_daily_check(
        &self,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
    ) -> ApiResult<DailyCheckSummary> {
        Ok(self.sla_monitor.run_daily_check(now, cancel).await?)
    }

    pub async fn run_reconciliation(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        actor: &Actor,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
    ) -> ApiResult<ReconciliationReport> {
        Ok(self
            .reconciliation_engine
            .run_reconciliation(period_start, period_end, actor, now, cancel)
            .await?)
    }

    pub fn recent_reports(&self, limit: usize) -> ApiResult<Vec<ReconciliationReport>> {
        Ok(self.reports.list_recent(limit)?)
    }
}
