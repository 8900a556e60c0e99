// ==========================================
// Roofline Ops - SLA monitor
// ==========================================
// Watches ticket stage dwell times against the stage catalog, detects
// bottlenecks and duplicate orders, checks material availability and runs
// the nightly overdue sweep. Every alert is deduplicated against the
// active set: at most one open alert per (type, entity, context key).
// ==========================================

use crate::config::OpsConfigReader;
use crate::domain::alert::Alert;
use crate::domain::id::IdGenerator;
use crate::domain::permission::{is_permitted, Actor, Permission};
use crate::domain::stage::StageCatalog;
use crate::domain::ticket::{OrderIntake, Ticket};
use crate::domain::types::{AlertSeverity, AlertType, NotifyPriority, Role, TicketStage};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::notify::{notify_best_effort, Notifier};
use crate::repository::{AlertRepository, BillingRepository, TicketRepository, VendorPurchaseRepository};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Snapshot of on-hand stock for one product, as reported by the warehouse.
#[derive(Debug, Clone)]
pub struct InventoryLevel {
    pub product_id: String,
    pub current_qty: f64,
    pub min_qty: f64,
}

/// Outcome of the nightly sweep. Per-item failures are collected rather than
/// aborting the run.
#[derive(Debug, Default)]
pub struct DailyCheckSummary {
    pub alerts_created: usize,
    pub overdue_items: usize,
    pub issues: Vec<String>,
}

pub struct SlaMonitor {
    tickets: Arc<TicketRepository>,
    billing: Arc<BillingRepository>,
    vendors: Arc<VendorPurchaseRepository>,
    alerts: Arc<AlertRepository>,
    catalog: Arc<StageCatalog>,
    config: Arc<dyn OpsConfigReader>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<dyn IdGenerator>,
}

impl SlaMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tickets: Arc<TicketRepository>,
        billing: Arc<BillingRepository>,
        vendors: Arc<VendorPurchaseRepository>,
        alerts: Arc<AlertRepository>,
        catalog: Arc<StageCatalog>,
        config: Arc<dyn OpsConfigReader>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            tickets,
            billing,
            vendors,
            alerts,
            catalog,
            config,
            notifier,
            ids,
        }
    }

    // ==========================================
    // Stage SLA
    // ==========================================

    /// Evaluate one ticket's current stage dwell time. Returns the alert
    /// created, or None when the ticket is within limits or an equivalent
    /// alert is already active.
    pub async fn check_stage_sla(
        &self,
        ticket: &Ticket,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<Alert>> {
        if ticket.is_terminal() {
            return Ok(None);
        }
        let entered_at = match ticket.entered_current_stage_at() {
            Some(t) => t,
            None => return Ok(None),
        };
        let dwell = now - entered_at;

        let violation = self.catalog.violation_limit(ticket.ticket_type, ticket.current_stage);
        let warning = self.catalog.warning_limit(ticket.ticket_type, ticket.current_stage);
        let (alert_type, mut severity, limit) = match (violation, warning) {
            (Some(max), _) if dwell >= max => (AlertType::SlaViolation, AlertSeverity::High, max),
            (_, Some(estimated)) if dwell >= estimated => {
                (AlertType::SlaWarning, AlertSeverity::Medium, estimated)
            }
            _ => return Ok(None),
        };

        if alert_type == AlertType::SlaViolation {
            let critical_days = self.config.sla_critical_overage_days().await?;
            if dwell - limit > Duration::days(critical_days) {
                severity = AlertSeverity::Critical;
            }
        }

        let context_key = ticket.current_stage.to_db_str();
        if self
            .alerts
            .find_active(alert_type, Some(&ticket.ticket_id), None, Some(context_key))?
            .is_some()
        {
            return Ok(None);
        }

        let notify_roles = self
            .catalog
            .definition(ticket.ticket_type, ticket.current_stage)
            .map(|d| d.notify_roles.clone())
            .unwrap_or_else(|| vec![Role::Dispatcher]);

        let message = format!(
            "Ticket {} has been in {} for {} minutes (limit {} minutes)",
            ticket.ticket_id,
            ticket.current_stage,
            dwell.num_minutes(),
            limit.num_minutes()
        );
        let alert = Alert::new(self.ids.next_id("ALR"), alert_type, severity, message.clone(), now)
            .with_ticket(&ticket.ticket_id)
            .with_job(&ticket.job_id)
            .with_context_key(context_key)
            .with_notify_roles(notify_roles.clone());
        self.alerts.insert(&alert)?;
        info!(
            ticket_id = %ticket.ticket_id,
            stage = %ticket.current_stage,
            severity = %severity,
            "stage SLA alert"
        );
        notify_best_effort(self.notifier.as_ref(), &notify_roles, &message, NotifyPriority::Urgent)
            .await;

        Ok(Some(alert))
    }

    /// Sweep all active tickets through check_stage_sla.
    pub async fn check_all_stage_slas(&self, now: DateTime<Utc>) -> EngineResult<Vec<Alert>> {
        let mut created = Vec::new();
        for ticket in self.tickets.list_active()? {
            if let Some(alert) = self.check_stage_sla(&ticket, now).await? {
                created.push(alert);
            }
        }
        Ok(created)
    }

    // ==========================================
    // Bottlenecks
    // ==========================================

    /// Flag stages where tickets are piling up: any stage holding at least
    /// the configured count of non-terminal tickets is congested, however
    /// recently they arrived. Emits one alert per stage, never per ticket;
    /// an open alert is superseded when the congestion worsens.
    pub async fn detect_bottlenecks(&self, now: DateTime<Utc>) -> EngineResult<Vec<Alert>> {
        let warning_count = self.config.bottleneck_warning_count().await?;
        let high_count = self.config.bottleneck_high_count().await?;

        let mut by_stage: HashMap<TicketStage, Vec<String>> = HashMap::new();
        for ticket in self.tickets.list_active()? {
            by_stage
                .entry(ticket.current_stage)
                .or_default()
                .push(ticket.ticket_id);
        }

        let mut created = Vec::new();
        let mut stages: Vec<_> = by_stage.into_iter().collect();
        stages.sort_by_key(|(stage, _)| stage.to_db_str());
        for (stage, mut ticket_ids) in stages {
            if ticket_ids.len() < warning_count {
                continue;
            }
            ticket_ids.sort();
            let severity = if ticket_ids.len() >= high_count {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };
            let context_key = stage.to_db_str();
            if let Some(existing) = self
                .alerts
                .find_active(AlertType::Bottleneck, None, None, Some(context_key))?
            {
                if existing.severity >= severity {
                    continue;
                }
                // Congestion worsened while the alert was open; supersede it.
                self.alerts.resolve(&existing.alert_id, "system", now)?;
            }
            let message = format!(
                "Bottleneck at {}: {} tickets waiting ({})",
                stage,
                ticket_ids.len(),
                ticket_ids.join(", ")
            );
            let alert = Alert::new(
                self.ids.next_id("ALR"),
                AlertType::Bottleneck,
                severity,
                message.clone(),
                now,
            )
            .with_context_key(context_key)
            .with_notify_roles(vec![Role::Dispatcher, Role::Admin]);
            self.alerts.insert(&alert)?;
            warn!(stage = %stage, count = ticket_ids.len(), "bottleneck detected");
            notify_best_effort(
                self.notifier.as_ref(),
                &[Role::Dispatcher, Role::Admin],
                &message,
                NotifyPriority::Urgent,
            )
            .await;
            created.push(alert);
        }
        Ok(created)
    }

    // ==========================================
    // Order screening
    // ==========================================

    /// Look for an active ticket that matches the intake on normalized
    /// address and requested date. Called before ticket creation.
    pub async fn check_duplicate_order(
        &self,
        intake: &OrderIntake,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<Alert>> {
        let wanted = normalize_address(&intake.address);
        let duplicate = self.tickets.list_active()?.into_iter().find(|t| {
            normalize_address(&t.address) == wanted && t.requested_date == intake.requested_date
        });
        let duplicate = match duplicate {
            Some(t) => t,
            None => return Ok(None),
        };

        if self
            .alerts
            .find_active(
                AlertType::Duplicate,
                Some(&duplicate.ticket_id),
                None,
                Some(&wanted),
            )?
            .is_some()
        {
            return Ok(None);
        }

        let date_label = duplicate
            .requested_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "an unspecified date".to_string());
        let message = format!(
            "Possible duplicate order: ticket {} already targets {} on {}",
            duplicate.ticket_id, duplicate.address, date_label
        );
        let alert = Alert::new(
            self.ids.next_id("ALR"),
            AlertType::Duplicate,
            AlertSeverity::High,
            message.clone(),
            now,
        )
        .with_ticket(&duplicate.ticket_id)
        .with_job(&duplicate.job_id)
        .with_context_key(&wanted)
        .with_notify_roles(vec![Role::Dispatcher]);
        self.alerts.insert(&alert)?;
        notify_best_effort(
            self.notifier.as_ref(),
            &[Role::Dispatcher],
            &message,
            NotifyPriority::Urgent,
        )
        .await;
        Ok(Some(alert))
    }

    /// Compare an intake's lines against warehouse stock. Unknown product is
    /// High, a shortfall Critical, stock dipping below minimum Medium.
    pub async fn check_material_availability(
        &self,
        intake: &OrderIntake,
        stock: &[InventoryLevel],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<Alert>> {
        let by_product: HashMap<&str, &InventoryLevel> =
            stock.iter().map(|s| (s.product_id.as_str(), s)).collect();

        let mut created = Vec::new();
        for line in &intake.line_items {
            let (severity, message) = match by_product.get(line.product_id.as_str()) {
                None => (
                    AlertSeverity::High,
                    format!("Unknown product {} on order for {}", line.product_id, intake.job_id),
                ),
                Some(level) if line.ordered_qty > level.current_qty => (
                    AlertSeverity::Critical,
                    format!(
                        "Insufficient stock of {}: ordered {}, on hand {}",
                        line.product_id, line.ordered_qty, level.current_qty
                    ),
                ),
                Some(level) if level.current_qty - line.ordered_qty < level.min_qty => (
                    AlertSeverity::Medium,
                    format!(
                        "Order for {} drops {} below minimum {}",
                        intake.job_id, line.product_id, level.min_qty
                    ),
                ),
                Some(_) => continue,
            };

            if self
                .alerts
                .find_active(AlertType::LowStock, None, None, Some(&line.product_id))?
                .is_some()
            {
                continue;
            }
            let alert = Alert::new(
                self.ids.next_id("ALR"),
                AlertType::LowStock,
                severity,
                message.clone(),
                now,
            )
            .with_job(&intake.job_id)
            .with_context_key(&line.product_id)
            .with_notify_roles(vec![Role::Warehouse, Role::Dispatcher]);
            self.alerts.insert(&alert)?;
            notify_best_effort(
                self.notifier.as_ref(),
                &[Role::Warehouse, Role::Dispatcher],
                &message,
                NotifyPriority::Urgent,
            )
            .await;
            created.push(alert);
        }
        Ok(created)
    }

    // ==========================================
    // Nightly sweep
    // ==========================================

    /// Overdue billing, overdue vendor payments, stage SLAs and bottlenecks
    /// in a single pass. Individual failures go into the summary; the cancel
    /// flag stops the sweep between items, returning counters that cover
    /// only the completed work.
    pub async fn run_daily_check(
        &self,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
    ) -> EngineResult<DailyCheckSummary> {
        let mut summary = DailyCheckSummary::default();
        let critical_days = self.config.overdue_critical_days().await?;

        for record in self.billing.list_unbilled_overdue(now)? {
            if cancel.load(Ordering::Relaxed) {
                info!("daily check cancelled");
                return Ok(summary);
            }
            summary.overdue_items += 1;
            let deadline = match record.billing_deadline {
                Some(d) => d,
                None => continue,
            };
            let severity = if now - deadline > Duration::days(critical_days) {
                AlertSeverity::Critical
            } else {
                AlertSeverity::High
            };
            match self.emit_overdue_billing_alert(&record.billing_id, deadline, severity, now).await
            {
                Ok(true) => summary.alerts_created += 1,
                Ok(false) => {}
                Err(e) => summary.issues.push(format!("billing {}: {}", record.billing_id, e)),
            }
        }

        for purchase in self.vendors.list_pending_due(now)? {
            if cancel.load(Ordering::Relaxed) {
                info!("daily check cancelled");
                return Ok(summary);
            }
            summary.overdue_items += 1;
            match self.emit_vendor_due_alert(&purchase.purchase_id, &purchase.vendor, now).await {
                Ok(true) => summary.alerts_created += 1,
                Ok(false) => {}
                Err(e) => summary.issues.push(format!("purchase {}: {}", purchase.purchase_id, e)),
            }
        }

        if cancel.load(Ordering::Relaxed) {
            info!("daily check cancelled");
            return Ok(summary);
        }

        match self.check_all_stage_slas(now).await {
            Ok(alerts) => summary.alerts_created += alerts.len(),
            Err(e) => summary.issues.push(format!("stage sweep: {}", e)),
        }
        match self.detect_bottlenecks(now).await {
            Ok(alerts) => summary.alerts_created += alerts.len(),
            Err(e) => summary.issues.push(format!("bottleneck sweep: {}", e)),
        }

        info!(
            alerts_created = summary.alerts_created,
            overdue_items = summary.overdue_items,
            issues = summary.issues.len(),
            "daily check complete"
        );
        Ok(summary)
    }

    async fn emit_overdue_billing_alert(
        &self,
        billing_id: &str,
        deadline: DateTime<Utc>,
        severity: AlertSeverity,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        if self
            .alerts
            .find_active(AlertType::OverdueBilling, None, Some(billing_id), None)?
            .is_some()
        {
            return Ok(false);
        }
        let message = format!(
            "Billing record {} is past its deadline ({} days overdue)",
            billing_id,
            (now - deadline).num_days()
        );
        let alert = Alert::new(
            self.ids.next_id("ALR"),
            AlertType::OverdueBilling,
            severity,
            message.clone(),
            now,
        )
        .with_billing(billing_id)
        .with_notify_roles(vec![Role::Billing, Role::Admin]);
        self.alerts.insert(&alert)?;
        notify_best_effort(
            self.notifier.as_ref(),
            &[Role::Billing, Role::Admin],
            &message,
            NotifyPriority::Urgent,
        )
        .await;
        Ok(true)
    }

    async fn emit_vendor_due_alert(
        &self,
        purchase_id: &str,
        vendor: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        if self
            .alerts
            .find_active(AlertType::VendorPaymentDue, None, None, Some(purchase_id))?
            .is_some()
        {
            return Ok(false);
        }
        let message = format!("Vendor payment due: purchase {} from {}", purchase_id, vendor);
        let alert = Alert::new(
            self.ids.next_id("ALR"),
            AlertType::VendorPaymentDue,
            AlertSeverity::High,
            message.clone(),
            now,
        )
        .with_context_key(purchase_id)
        .with_notify_roles(vec![Role::Billing]);
        self.alerts.insert(&alert)?;
        notify_best_effort(self.notifier.as_ref(), &[Role::Billing], &message, NotifyPriority::Normal)
            .await;
        Ok(true)
    }

    // ==========================================
    // Alert handling
    // ==========================================

    pub async fn acknowledge_alert(
        &self,
        alert_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        if !is_permitted(actor, Permission::ResolveAlert) {
            return Err(EngineError::Validation(format!(
                "role {} may not acknowledge alerts",
                actor.role
            )));
        }
        self.alerts.acknowledge(alert_id, &actor.actor_id, now)?;
        Ok(())
    }

    pub async fn resolve_alert(
        &self,
        alert_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        if !is_permitted(actor, Permission::ResolveAlert) {
            return Err(EngineError::Validation(format!(
                "role {} may not resolve alerts",
                actor.role
            )));
        }
        self.alerts.resolve(alert_id, &actor.actor_id, now)?;
        info!(alert_id, actor = %actor.actor_id, "alert resolved");
        Ok(())
    }
}

/// Lowercase, collapse runs of whitespace, strip punctuation. "123 Main St."
/// and "123  main st" compare equal.
pub fn normalize_address(address: &str) -> String {
    address
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
