// ==========================================
// Roofline Ops - billing lifecycle engine
// ==========================================
// Creates billing records from ticket events, computes cost/charge/markup,
// decides approval requirements against configured thresholds, validates
// status transitions and maintains the append-only status history.
// Money stays at full precision here; rounding is a serialization concern.
// ==========================================

use crate::config::OpsConfigReader;
use crate::domain::alert::Alert;
use crate::domain::billing::{BillingRecord, MaterialLine, StatusHistoryEntry};
use crate::domain::id::IdGenerator;
use crate::domain::permission::{is_permitted, Actor, Permission};
use crate::domain::types::{
    AlertSeverity, AlertType, BillingStatus, CustomerPaymentStatus, NotifyPriority, Role,
    TicketStage, TicketType, TransactionType, VendorPaymentStatus,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::TicketEvent;
use crate::engine::notify::{notify_best_effort, Notifier};
use crate::repository::{AlertRepository, BillingRepository};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Input contract for creating a billing record.
#[derive(Debug, Clone)]
pub struct NewBillingRecord {
    pub lines: Vec<MaterialLine>,
    pub transaction_type: TransactionType,
    pub vendor: Option<String>,
    pub ticket_id: Option<String>,
    pub job_id: Option<String>,
}

pub struct BillingLifecycleEngine {
    billing: Arc<BillingRepository>,
    alerts: Arc<AlertRepository>,
    config: Arc<dyn OpsConfigReader>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<dyn IdGenerator>,
}

impl BillingLifecycleEngine {
    pub fn new(
        billing: Arc<BillingRepository>,
        alerts: Arc<AlertRepository>,
        config: Arc<dyn OpsConfigReader>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            billing,
            alerts,
            config,
            notifier,
            ids,
        }
    }

    // ==========================================
    // Creation
    // ==========================================

    /// Create a billing record. Totals and markup are derived from the lines;
    /// the approval requirement is fixed at creation time and never silently
    /// overridden afterwards.
    pub async fn create_billing_record(
        &self,
        input: NewBillingRecord,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> EngineResult<BillingRecord> {
        if !is_permitted(actor, Permission::CreateBilling) {
            return Err(EngineError::Validation(format!(
                "role {} may not create billing records",
                actor.role
            )));
        }
        if input.lines.is_empty() {
            return Err(EngineError::Validation(
                "billing record has no material lines".to_string(),
            ));
        }
        if let Some(bad) = input.lines.iter().find(|l| l.quantity <= 0.0) {
            return Err(EngineError::Validation(format!(
                "line {} has non-positive quantity",
                bad.product_id
            )));
        }

        let (total_cost, total_charge, markup_pct) = compute_totals(&input.lines);
        let (requires_approval, approval_reason) =
            self.evaluate_approval(&input.lines, total_charge, markup_pct).await?;

        // Returns go straight into the credit path.
        let initial_status = if input.transaction_type == TransactionType::Return {
            BillingStatus::CreditPending
        } else {
            BillingStatus::PendingReview
        };

        let record = BillingRecord {
            billing_id: self.ids.next_id("BIL"),
            ticket_id: input.ticket_id,
            job_id: input.job_id,
            transaction_type: input.transaction_type,
            billing_status: initial_status,
            lines: input.lines,
            total_cost,
            total_charge,
            markup_pct,
            requires_approval,
            approval_reason: approval_reason.clone(),
            approved_by: None,
            approved_at: None,
            billed_by: None,
            billed_at: None,
            // Deadline is only set once materials actually leave the warehouse.
            billing_deadline: None,
            customer_payment_status: CustomerPaymentStatus::Unbilled,
            vendor_payment_status: input.vendor.as_ref().map(|_| VendorPaymentStatus::Pending),
            vendor: input.vendor,
            status_history: vec![StatusHistoryEntry {
                from_status: None,
                to_status: initial_status,
                actor: actor.actor_id.clone(),
                at: now,
                reason: Some("created".to_string()),
            }],
            created_by: actor.actor_id.clone(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        self.billing.insert(&record)?;
        info!(
            billing_id = %record.billing_id,
            transaction_type = %record.transaction_type,
            total_charge = record.total_charge,
            requires_approval,
            "billing record created"
        );

        if requires_approval {
            self.emit_approval_alert(&record, approval_reason.as_deref(), now)
                .await;
        }

        Ok(record)
    }

    /// Approval rule: OR of independent checks, reasons concatenated.
    /// Thresholds come from configuration; comparisons use full precision.
    async fn evaluate_approval(
        &self,
        lines: &[MaterialLine],
        total_charge: f64,
        markup_pct: f64,
    ) -> EngineResult<(bool, Option<String>)> {
        let charge_limit = self.config.approval_charge_limit().await?;
        let min_markup = self.config.approval_min_markup_pct().await?;
        let max_markup = self.config.approval_max_markup_pct().await?;
        let qty_limit = self.config.approval_line_qty_limit().await?;

        let mut reasons = Vec::new();
        if total_charge > charge_limit {
            reasons.push(format!(
                "High value: total charge {:.2} exceeds {:.2}",
                total_charge, charge_limit
            ));
        }
        // A zero-cost record has markup 0 and trips the floor like any other.
        if markup_pct < min_markup {
            reasons.push(format!(
                "Low markup: {:.1}% below {:.1}%",
                markup_pct, min_markup
            ));
        }
        if markup_pct > max_markup {
            reasons.push(format!(
                "Excessive markup: {:.1}% above {:.1}%",
                markup_pct, max_markup
            ));
        }
        for line in lines {
            if line.quantity > qty_limit {
                reasons.push(format!(
                    "Unusual quantity: line {} qty {} exceeds {}",
                    line.product_id, line.quantity, qty_limit
                ));
            }
        }

        if reasons.is_empty() {
            Ok((false, None))
        } else {
            Ok((true, Some(reasons.join("; "))))
        }
    }

    async fn emit_approval_alert(
        &self,
        record: &BillingRecord,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let message = format!(
            "Billing record {} requires approval: {}",
            record.billing_id,
            reason.unwrap_or("unspecified")
        );
        let alert = Alert::new(
            self.ids.next_id("ALR"),
            AlertType::ApprovalRequired,
            AlertSeverity::High,
            message.clone(),
            now,
        )
        .with_billing(&record.billing_id)
        .with_notify_roles(vec![Role::Billing, Role::Admin]);
        if let Err(e) = self.alerts.insert(&alert) {
            warn!("approval alert write failed (ignored): {}", e);
        }
        notify_best_effort(
            self.notifier.as_ref(),
            &[Role::Billing, Role::Admin],
            &message,
            NotifyPriority::Urgent,
        )
        .await;
    }

    // ==========================================
    // Status transitions
    // ==========================================

    /// Move a billing record through the status graph. An illegal move is
    /// rejected without a history entry; a legal one appends exactly one.
    pub async fn update_billing_status(
        &self,
        billing_id: &str,
        new_status: BillingStatus,
        actor: &Actor,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<BillingRecord> {
        if !is_permitted(actor, Permission::UpdateBillingStatus) {
            return Err(EngineError::Validation(format!(
                "role {} may not update billing status",
                actor.role
            )));
        }
        if new_status == BillingStatus::Approved && !is_permitted(actor, Permission::ApproveBilling)
        {
            return Err(EngineError::Validation(format!(
                "role {} may not approve billing records",
                actor.role
            )));
        }

        let mut record = self.billing.get(billing_id)?;

        if !record.billing_status.can_transition_to(new_status) {
            return Err(EngineError::InvalidTransition {
                from: record.billing_status.to_string(),
                to: new_status.to_string(),
            });
        }

        let from_status = record.billing_status;
        record.billing_status = new_status;
        record.updated_at = now;

        match new_status {
            BillingStatus::Approved => {
                record.approved_by = Some(actor.actor_id.clone());
                record.approved_at = Some(now);
            }
            BillingStatus::MaterialsOut => {
                let deadline_days = self.config.billing_deadline_days().await?;
                let candidate = now + Duration::days(deadline_days);
                // The deadline only ever moves forward.
                record.billing_deadline = Some(match record.billing_deadline {
                    Some(existing) if existing >= candidate => existing,
                    _ => candidate,
                });
            }
            BillingStatus::Billed => {
                record.billed_by = Some(actor.actor_id.clone());
                record.billed_at = Some(now);
                record.customer_payment_status = CustomerPaymentStatus::Billed;
            }
            BillingStatus::Paid => {
                record.customer_payment_status = CustomerPaymentStatus::Paid;
            }
            BillingStatus::Credited => {
                record.customer_payment_status = CustomerPaymentStatus::Credited;
            }
            _ => {}
        }

        record.status_history.push(StatusHistoryEntry {
            from_status: Some(from_status),
            to_status: new_status,
            actor: actor.actor_id.clone(),
            at: now,
            reason: reason.map(|r| r.to_string()),
        });

        let updated = self.billing.update_with_revision(&record)?;
        info!(
            billing_id = %updated.billing_id,
            from = %from_status,
            to = %new_status,
            actor = %actor.actor_id,
            "billing status change"
        );

        let message = format!(
            "Billing record {} moved {} -> {}",
            updated.billing_id, from_status, new_status
        );
        notify_best_effort(
            self.notifier.as_ref(),
            &[Role::Billing],
            &message,
            NotifyPriority::Normal,
        )
        .await;

        Ok(updated)
    }

    // ==========================================
    // Ticket event hook
    // ==========================================

    /// React to a stage-entered event from the ticket state machine. A
    /// delivery reaching Delivered and a return reaching Verified produce a
    /// billing record; other events are ignored.
    pub async fn handle_stage_event(
        &self,
        event: &TicketEvent,
        lines: Vec<MaterialLine>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<BillingRecord>> {
        let transaction_type = match (event.ticket_type, event.stage) {
            (TicketType::Delivery, TicketStage::Delivered) => TransactionType::Delivery,
            (TicketType::Return, TicketStage::Verified) => TransactionType::Return,
            _ => return Ok(None),
        };

        let record = self
            .create_billing_record(
                NewBillingRecord {
                    lines,
                    transaction_type,
                    vendor: None,
                    ticket_id: Some(event.ticket_id.clone()),
                    job_id: Some(event.job_id.clone()),
                },
                actor,
                now,
            )
            .await?;
        Ok(Some(record))
    }
}

/// totalCost = sum(unitCost * qty); totalCharge = sum(unitCharge * qty);
/// markup = (charge - cost) / cost * 100, zero when cost is zero.
pub fn compute_totals(lines: &[MaterialLine]) -> (f64, f64, f64) {
    let total_cost: f64 = lines.iter().map(|l| l.line_cost()).sum();
    let total_charge: f64 = lines.iter().map(|l| l.line_charge()).sum();
    let markup_pct = if total_cost > 0.0 {
        (total_charge - total_cost) / total_cost * 100.0
    } else {
        0.0
    };
    (total_cost, total_charge, markup_pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::id::SequenceIdGenerator;
    use crate::engine::notify::LogNotifier;
    use async_trait::async_trait;
    use rusqlite::Connection;
    use std::sync::Mutex;

    struct MockConfig;

    #[async_trait]
    impl OpsConfigReader for MockConfig {
        async fn approval_charge_limit(&self) -> anyhow::Result<f64> {
            Ok(5000.0)
        }
        async fn approval_min_markup_pct(&self) -> anyhow::Result<f64> {
            Ok(15.0)
        }
        async fn approval_max_markup_pct(&self) -> anyhow::Result<f64> {
            Ok(100.0)
        }
        async fn approval_line_qty_limit(&self) -> anyhow::Result<f64> {
            Ok(100.0)
        }
        async fn billing_deadline_days(&self) -> anyhow::Result<i64> {
            Ok(3)
        }
        async fn overdue_critical_days(&self) -> anyhow::Result<i64> {
            Ok(7)
        }
        async fn sla_critical_overage_days(&self) -> anyhow::Result<i64> {
            Ok(7)
        }
        async fn bottleneck_warning_count(&self) -> anyhow::Result<usize> {
            Ok(3)
        }
        async fn bottleneck_high_count(&self) -> anyhow::Result<usize> {
            Ok(5)
        }
    }

    fn engine() -> (BillingLifecycleEngine, Arc<AlertRepository>) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let alerts = Arc::new(AlertRepository::from_connection(conn.clone()));
        let engine = BillingLifecycleEngine::new(
            Arc::new(BillingRepository::from_connection(conn)),
            alerts.clone(),
            Arc::new(MockConfig),
            Arc::new(LogNotifier),
            Arc::new(SequenceIdGenerator::new()),
        );
        (engine, alerts)
    }

    fn biller() -> Actor {
        Actor::new("bea", Role::Billing)
    }

    fn delivery(lines: Vec<MaterialLine>) -> NewBillingRecord {
        NewBillingRecord {
            lines,
            transaction_type: TransactionType::Delivery,
            vendor: None,
            ticket_id: Some("TKT-1".to_string()),
            job_id: Some("JOB-1".to_string()),
        }
    }

    #[test]
    fn test_compute_totals_scenario_a() {
        let lines = vec![MaterialLine::new("UNDERLAYMENT", 10.0, 5.0, 6.0)];
        let (cost, charge, markup) = compute_totals(&lines);
        assert_eq!(cost, 50.0);
        assert_eq!(charge, 60.0);
        assert_eq!(markup, 20.0);
    }

    #[test]
    fn test_compute_totals_zero_cost() {
        let lines = vec![MaterialLine::new("FREEBIE", 5.0, 0.0, 10.0)];
        let (cost, _, markup) = compute_totals(&lines);
        assert_eq!(cost, 0.0);
        assert_eq!(markup, 0.0);
    }

    #[tokio::test]
    async fn test_scenario_a_no_approval() {
        let (engine, _) = engine();
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("UNDERLAYMENT", 10.0, 5.0, 6.0)]),
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(record.total_cost, 50.0);
        assert_eq!(record.total_charge, 60.0);
        assert_eq!(record.markup_display(), 20.0);
        assert!(!record.requires_approval);
        assert_eq!(record.billing_status, BillingStatus::PendingReview);
        assert!(record.billing_deadline.is_none());
        assert_eq!(record.status_history.len(), 1);
    }

    #[tokio::test]
    async fn test_scenario_b_unusual_quantity() {
        let (engine, alerts) = engine();
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("NAILS-COIL", 150.0, 1.0, 1.3)]),
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(record.requires_approval);
        assert!(record.approval_reason.unwrap().contains("Unusual quantity"));
        // Approval alert emitted alongside
        let active = alerts.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].alert_type, AlertType::ApprovalRequired);
    }

    #[tokio::test]
    async fn test_approval_boundaries_exact() {
        let (engine, _) = engine();
        // total charge exactly 5000: not over the limit
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("SHINGLE", 100.0, 40.0, 50.0)]),
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(record.total_charge, 5000.0);
        // markup here is 25%, qty exactly 100: none of the checks fire
        assert!(!record.requires_approval);

        // markup exactly 15%: not below
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("RIDGE-CAP", 10.0, 100.0, 115.0)]),
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(!record.requires_approval);

        // markup exactly 100%: not above
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("DRIP-EDGE", 10.0, 10.0, 20.0)]),
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(!record.requires_approval);

        // just past the boundaries
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("DRIP-EDGE", 10.0, 10.0, 20.01)]),
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(record.requires_approval);
    }

    #[tokio::test]
    async fn test_zero_cost_record_requires_approval() {
        let (engine, _) = engine();
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("FREEBIE", 5.0, 0.0, 10.0)]),
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(record.markup_pct, 0.0);
        assert!(record.requires_approval);
        assert!(record.approval_reason.unwrap().contains("Low markup"));
    }

    #[tokio::test]
    async fn test_return_starts_credit_pending() {
        let (engine, _) = engine();
        let record = engine
            .create_billing_record(
                NewBillingRecord {
                    lines: vec![MaterialLine::new("SHINGLE", 5.0, 40.0, 50.0)],
                    transaction_type: TransactionType::Return,
                    vendor: None,
                    ticket_id: None,
                    job_id: Some("JOB-2".to_string()),
                },
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(record.billing_status, BillingStatus::CreditPending);
    }

    #[tokio::test]
    async fn test_status_history_grows_by_one_per_success() {
        let (engine, _) = engine();
        let now = Utc::now();
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("SHINGLE", 10.0, 40.0, 50.0)]),
                &biller(),
                now,
            )
            .await
            .unwrap();
        assert_eq!(record.status_history.len(), 1);

        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::Approved, &biller(), None, now)
            .await
            .unwrap();
        assert_eq!(record.status_history.len(), 2);
        assert_eq!(record.approved_by.as_deref(), Some("bea"));

        // Illegal move: no history entry written
        let err = engine
            .update_billing_status(&record.billing_id, BillingStatus::Paid, &biller(), None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        let reloaded = engine.billing.get(&record.billing_id).unwrap();
        assert_eq!(reloaded.status_history.len(), 2);
    }

    #[tokio::test]
    async fn test_billing_deadline_monotonic() {
        let (engine, _) = engine();
        let t0 = Utc::now();
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("SHINGLE", 10.0, 40.0, 50.0)]),
                &biller(),
                t0,
            )
            .await
            .unwrap();

        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::Approved, &biller(), None, t0)
            .await
            .unwrap();
        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::MaterialsOut, &biller(), None, t0)
            .await
            .unwrap();
        let first_deadline = record.billing_deadline.unwrap();
        assert_eq!(first_deadline, t0 + Duration::days(3));

        // Flag, re-approve, send out again at an earlier clock: deadline
        // must not move backwards.
        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::Flagged, &biller(), Some("recheck"), t0)
            .await
            .unwrap();
        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::Approved, &biller(), None, t0)
            .await
            .unwrap();
        let earlier = t0 - Duration::days(2);
        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::MaterialsOut, &biller(), None, earlier)
            .await
            .unwrap();
        assert_eq!(record.billing_deadline.unwrap(), first_deadline);

        // A later re-entry extends it.
        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::Flagged, &biller(), None, t0)
            .await
            .unwrap();
        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::Approved, &biller(), None, t0)
            .await
            .unwrap();
        let later = t0 + Duration::days(2);
        let record = engine
            .update_billing_status(&record.billing_id, BillingStatus::MaterialsOut, &biller(), None, later)
            .await
            .unwrap();
        assert_eq!(record.billing_deadline.unwrap(), later + Duration::days(3));
    }

    #[tokio::test]
    async fn test_billed_sets_payment_status() {
        let (engine, _) = engine();
        let now = Utc::now();
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("SHINGLE", 10.0, 40.0, 50.0)]),
                &biller(),
                now,
            )
            .await
            .unwrap();
        for status in [
            BillingStatus::Approved,
            BillingStatus::MaterialsOut,
            BillingStatus::Delivered,
            BillingStatus::PendingBilling,
            BillingStatus::Billed,
        ] {
            engine
                .update_billing_status(&record.billing_id, status, &biller(), None, now)
                .await
                .unwrap();
        }
        let reloaded = engine.billing.get(&record.billing_id).unwrap();
        assert_eq!(reloaded.customer_payment_status, CustomerPaymentStatus::Billed);
        assert_eq!(reloaded.billed_by.as_deref(), Some("bea"));
        assert_eq!(reloaded.status_history.len(), 6);
    }

    #[tokio::test]
    async fn test_driver_cannot_update_status() {
        let (engine, _) = engine();
        let record = engine
            .create_billing_record(
                delivery(vec![MaterialLine::new("SHINGLE", 10.0, 40.0, 50.0)]),
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap();
        let err = engine
            .update_billing_status(
                &record.billing_id,
                BillingStatus::Approved,
                &Actor::new("dale", Role::Driver),
                None,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_stage_event_creates_delivery_record() {
        let (engine, _) = engine();
        let event = TicketEvent {
            ticket_id: "TKT-9".to_string(),
            ticket_type: TicketType::Delivery,
            job_id: "JOB-9".to_string(),
            stage: TicketStage::Delivered,
            entered_at: Utc::now(),
            actor: "dale".to_string(),
        };
        let record = engine
            .handle_stage_event(
                &event,
                vec![MaterialLine::new("SHINGLE", 10.0, 40.0, 50.0)],
                &biller(),
                Utc::now(),
            )
            .await
            .unwrap()
            .expect("record expected");
        assert_eq!(record.ticket_id.as_deref(), Some("TKT-9"));
        assert_eq!(record.transaction_type, TransactionType::Delivery);

        // A mid-flow stage produces nothing.
        let event = TicketEvent {
            stage: TicketStage::Loaded,
            ..event
        };
        let none = engine
            .handle_stage_event(&event, vec![], &biller(), Utc::now())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_unknown_record_not_found() {
        let (engine, _) = engine();
        let err = engine
            .update_billing_status("BIL-nope", BillingStatus::Approved, &biller(), None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
