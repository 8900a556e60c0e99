// ==========================================
// Roofline Ops - reconciliation engine
// ==========================================
// Period closing: compares billed deliveries, credited returns and vendor
// purchases, collects discrepancies, raises alerts for the serious ones and
// archives an immutable report. Re-running the same period with unchanged
// data yields the same discrepancy list; alert dedup keeps the active set
// from growing.
// ==========================================

use crate::domain::alert::Alert;
use crate::domain::id::IdGenerator;
use crate::domain::permission::{is_permitted, Actor, Permission};
use crate::domain::reconciliation::{Discrepancy, DiscrepancyType, ReconciliationReport};
use crate::domain::types::{
    AlertSeverity, AlertType, BillingStatus, NotifyPriority, Role, TransactionType,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::notify::{notify_best_effort, Notifier};
use crate::repository::{AlertRepository, BillingRepository, ReconciliationReportRepository, VendorPurchaseRepository};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Discrepancy amounts above this are treated as High severity.
const HIGH_AMOUNT_THRESHOLD: f64 = 1000.0;

pub struct ReconciliationEngine {
    billing: Arc<BillingRepository>,
    vendors: Arc<VendorPurchaseRepository>,
    reports: Arc<ReconciliationReportRepository>,
    alerts: Arc<AlertRepository>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<dyn IdGenerator>,
}

impl ReconciliationEngine {
    pub fn new(
        billing: Arc<BillingRepository>,
        vendors: Arc<VendorPurchaseRepository>,
        reports: Arc<ReconciliationReportRepository>,
        alerts: Arc<AlertRepository>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            billing,
            vendors,
            reports,
            alerts,
            notifier,
            ids,
        }
    }

    /// Run reconciliation over [period_start, period_end]. Cancellation via
    /// the flag aborts before the report is archived; alerts already written
    /// stay (they describe real problems regardless of the aborted run).
    pub async fn run_reconciliation(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        actor: &Actor,
        now: DateTime<Utc>,
        cancel: &AtomicBool,
    ) -> EngineResult<ReconciliationReport> {
        if !is_permitted(actor, Permission::RunBatchJobs) {
            return Err(EngineError::Validation(format!(
                "role {} may not run reconciliation",
                actor.role
            )));
        }
        if period_end < period_start {
            return Err(EngineError::Validation(
                "period end precedes period start".to_string(),
            ));
        }

        let records = self.billing.list_in_period(period_start, period_end)?;
        let purchases = self.vendors.list_in_period(period_start, period_end)?;

        let mut report = ReconciliationReport {
            report_id: self.ids.next_id("REC"),
            period_start,
            period_end,
            generated_at: now,
            generated_by: actor.actor_id.clone(),
            delivery_count: 0,
            delivery_total: 0.0,
            return_count: 0,
            return_total: 0.0,
            vendor_purchase_count: purchases.len(),
            vendor_purchase_total: purchases.iter().map(|p| p.amount).sum(),
            discrepancies: Vec::new(),
        };

        let mut discrepancies = Vec::new();

        for record in &records {
            match record.transaction_type {
                TransactionType::Delivery => {
                    report.delivery_count += 1;
                    report.delivery_total += record.total_charge;
                    let past_deadline = record
                        .billing_deadline
                        .map(|d| d < now)
                        .unwrap_or(false);
                    if past_deadline
                        && record.customer_payment_status
                            == crate::domain::types::CustomerPaymentStatus::Unbilled
                    {
                        discrepancies.push(Discrepancy {
                            discrepancy_type: DiscrepancyType::Unbilled,
                            job_id: record.job_id.clone(),
                            billing_id: Some(record.billing_id.clone()),
                            purchase_id: None,
                            description: format!(
                                "Delivery {} past its billing deadline and still unbilled",
                                record.billing_id
                            ),
                            amount: record.total_charge,
                            severity: severity_for(record.total_charge),
                        });
                    }
                }
                TransactionType::Return => {
                    report.return_count += 1;
                    report.return_total += record.total_charge;
                    if record.billing_status != BillingStatus::Credited {
                        discrepancies.push(Discrepancy {
                            discrepancy_type: DiscrepancyType::Uncredited,
                            job_id: record.job_id.clone(),
                            billing_id: Some(record.billing_id.clone()),
                            purchase_id: None,
                            description: format!(
                                "Return {} has not been credited (status {})",
                                record.billing_id, record.billing_status
                            ),
                            amount: record.total_charge,
                            severity: AlertSeverity::Medium,
                        });
                    }
                }
                TransactionType::Loss => {
                    discrepancies.push(Discrepancy {
                        discrepancy_type: DiscrepancyType::Loss,
                        job_id: record.job_id.clone(),
                        billing_id: Some(record.billing_id.clone()),
                        purchase_id: None,
                        description: format!(
                            "Loss adjustment {} recorded in period",
                            record.billing_id
                        ),
                        amount: record.total_cost,
                        severity: severity_for(record.total_cost),
                    });
                }
                _ => {}
            }
        }

        for purchase in &purchases {
            if purchase.job_id.is_some() && !purchase.billed_to_job {
                discrepancies.push(Discrepancy {
                    discrepancy_type: DiscrepancyType::Unbilled,
                    job_id: purchase.job_id.clone(),
                    billing_id: None,
                    purchase_id: Some(purchase.purchase_id.clone()),
                    description: format!(
                        "Vendor purchase {} from {} is tied to a job but never billed through",
                        purchase.purchase_id, purchase.vendor
                    ),
                    amount: purchase.amount,
                    severity: AlertSeverity::High,
                });
            }
        }

        // Deterministic ordering makes repeat runs comparable.
        discrepancies.sort_by(|a, b| {
            (a.discrepancy_type, &a.billing_id, &a.purchase_id)
                .cmp(&(b.discrepancy_type, &b.billing_id, &b.purchase_id))
        });
        report.discrepancies = discrepancies;

        // Alert writes are isolated per discrepancy: one failed write is
        // logged and the remaining items still get their alerts.
        let mut alert_issues = Vec::new();
        for discrepancy in &report.discrepancies {
            if cancel.load(Ordering::Relaxed) {
                warn!(report_id = %report.report_id, "reconciliation cancelled");
                return Err(EngineError::Validation(
                    "reconciliation cancelled".to_string(),
                ));
            }
            if discrepancy.severity >= AlertSeverity::High {
                if let Err(e) = self.emit_discrepancy_alert(discrepancy, now).await {
                    let subject = discrepancy
                        .billing_id
                        .as_deref()
                        .or(discrepancy.purchase_id.as_deref())
                        .unwrap_or("unknown");
                    warn!(subject, "discrepancy alert write failed: {}", e);
                    alert_issues.push(format!("alert for {}: {}", subject, e));
                }
            }
        }

        if cancel.load(Ordering::Relaxed) {
            warn!(report_id = %report.report_id, "reconciliation cancelled");
            return Err(EngineError::Validation(
                "reconciliation cancelled".to_string(),
            ));
        }

        self.reports.insert(&report)?;
        info!(
            report_id = %report.report_id,
            deliveries = report.delivery_count,
            returns = report.return_count,
            purchases = report.vendor_purchase_count,
            discrepancies = report.discrepancies.len(),
            alert_issues = alert_issues.len(),
            "reconciliation report archived"
        );
        Ok(report)
    }

    async fn emit_discrepancy_alert(
        &self,
        discrepancy: &Discrepancy,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let context_key = discrepancy
            .billing_id
            .clone()
            .or_else(|| discrepancy.purchase_id.clone());
        if self
            .alerts
            .find_active(
                AlertType::LossDetected,
                None,
                discrepancy.billing_id.as_deref(),
                context_key.as_deref(),
            )?
            .is_some()
        {
            return Ok(());
        }

        let mut alert = Alert::new(
            self.ids.next_id("ALR"),
            AlertType::LossDetected,
            discrepancy.severity,
            format!(
                "{}: {} (amount {:.2})",
                discrepancy.discrepancy_type, discrepancy.description, discrepancy.amount
            ),
            now,
        )
        .with_notify_roles(vec![Role::Billing, Role::Admin]);
        if let Some(billing_id) = &discrepancy.billing_id {
            alert = alert.with_billing(billing_id);
        }
        if let Some(job_id) = &discrepancy.job_id {
            alert = alert.with_job(job_id);
        }
        if let Some(key) = &context_key {
            alert = alert.with_context_key(key);
        }
        let message = alert.message.clone();
        self.alerts.insert(&alert)?;
        notify_best_effort(
            self.notifier.as_ref(),
            &[Role::Billing, Role::Admin],
            &message,
            NotifyPriority::Urgent,
        )
        .await;
        Ok(())
    }

    pub fn recent_reports(&self, limit: usize) -> EngineResult<Vec<ReconciliationReport>> {
        Ok(self.reports.list_recent(limit)?)
    }
}

fn severity_for(amount: f64) -> AlertSeverity {
    if amount > HIGH_AMOUNT_THRESHOLD {
        AlertSeverity::High
    } else {
        AlertSeverity::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::billing::{BillingRecord, MaterialLine, StatusHistoryEntry};
    use crate::domain::id::SequenceIdGenerator;
    use crate::domain::types::CustomerPaymentStatus;
    use crate::domain::vendor::VendorPurchase;
    use crate::engine::notify::LogNotifier;
    use chrono::Duration;
    use rusqlite::Connection;
    use std::sync::Mutex;

    struct Fixture {
        engine: ReconciliationEngine,
        billing: Arc<BillingRepository>,
        vendors: Arc<VendorPurchaseRepository>,
        alerts: Arc<AlertRepository>,
        reports: Arc<ReconciliationReportRepository>,
        conn: Arc<Mutex<Connection>>,
    }

    fn fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let billing = Arc::new(BillingRepository::from_connection(conn.clone()));
        let vendors = Arc::new(VendorPurchaseRepository::from_connection(conn.clone()));
        let reports = Arc::new(ReconciliationReportRepository::from_connection(conn.clone()));
        let alerts = Arc::new(AlertRepository::from_connection(conn.clone()));
        let engine = ReconciliationEngine::new(
            billing.clone(),
            vendors.clone(),
            reports.clone(),
            alerts.clone(),
            Arc::new(LogNotifier),
            Arc::new(SequenceIdGenerator::new()),
        );
        Fixture {
            engine,
            billing,
            vendors,
            alerts,
            reports,
            conn,
        }
    }

    fn record(
        id: &str,
        transaction_type: TransactionType,
        status: BillingStatus,
        charge: f64,
        created_at: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
    ) -> BillingRecord {
        BillingRecord {
            billing_id: id.to_string(),
            ticket_id: None,
            job_id: Some("JOB-1".to_string()),
            transaction_type,
            billing_status: status,
            lines: vec![MaterialLine::new("SHINGLE", 1.0, charge / 1.2, charge)],
            total_cost: charge / 1.2,
            total_charge: charge,
            markup_pct: 20.0,
            requires_approval: false,
            approval_reason: None,
            approved_by: None,
            approved_at: None,
            billed_by: None,
            billed_at: None,
            billing_deadline: deadline,
            customer_payment_status: CustomerPaymentStatus::Unbilled,
            vendor_payment_status: None,
            vendor: None,
            status_history: vec![StatusHistoryEntry {
                from_status: None,
                to_status: status,
                actor: "bea".to_string(),
                at: created_at,
                reason: None,
            }],
            created_by: "bea".to_string(),
            created_at,
            updated_at: created_at,
            revision: 0,
        }
    }

    fn biller() -> Actor {
        Actor::new("bea", Role::Billing)
    }

    #[tokio::test]
    async fn test_clean_period_produces_empty_report() {
        let f = fixture();
        let now = Utc::now();
        let start = now - Duration::days(30);
        let mut rec = record(
            "BIL-1",
            TransactionType::Delivery,
            BillingStatus::Billed,
            500.0,
            now - Duration::days(10),
            Some(now + Duration::days(3)),
        );
        rec.customer_payment_status = CustomerPaymentStatus::Billed;
        f.billing.insert(&rec).unwrap();

        let report = f
            .engine
            .run_reconciliation(start, now, &biller(), now, &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(report.delivery_count, 1);
        assert_eq!(report.delivery_total, 500.0);
        assert!(report.discrepancies.is_empty());
        assert!(f.alerts.list_active().unwrap().is_empty());
        // report is archived
        assert_eq!(f.reports.list_recent(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unbilled_overdue_delivery_flagged() {
        let f = fixture();
        let now = Utc::now();
        let start = now - Duration::days(30);
        // 2500 past deadline: High, raises an alert
        f.billing
            .insert(&record(
                "BIL-1",
                TransactionType::Delivery,
                BillingStatus::MaterialsOut,
                2500.0,
                now - Duration::days(10),
                Some(now - Duration::days(4)),
            ))
            .unwrap();
        // 200 past deadline: Medium, no alert
        f.billing
            .insert(&record(
                "BIL-2",
                TransactionType::Delivery,
                BillingStatus::MaterialsOut,
                200.0,
                now - Duration::days(10),
                Some(now - Duration::days(4)),
            ))
            .unwrap();

        let report = f
            .engine
            .run_reconciliation(start, now, &biller(), now, &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(report.discrepancies.len(), 2);
        assert!(report
            .discrepancies
            .iter()
            .all(|d| d.discrepancy_type == DiscrepancyType::Unbilled));
        let high = report
            .discrepancies
            .iter()
            .find(|d| d.billing_id.as_deref() == Some("BIL-1"))
            .unwrap();
        assert_eq!(high.severity, AlertSeverity::High);
        let low = report
            .discrepancies
            .iter()
            .find(|d| d.billing_id.as_deref() == Some("BIL-2"))
            .unwrap();
        assert_eq!(low.severity, AlertSeverity::Medium);

        let active = f.alerts.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].alert_type, AlertType::LossDetected);
        assert_eq!(active[0].billing_id.as_deref(), Some("BIL-1"));
    }

    #[tokio::test]
    async fn test_uncredited_return_and_unbilled_purchase() {
        let f = fixture();
        let now = Utc::now();
        let start = now - Duration::days(30);
        f.billing
            .insert(&record(
                "BIL-1",
                TransactionType::Return,
                BillingStatus::CreditPending,
                300.0,
                now - Duration::days(5),
                None,
            ))
            .unwrap();
        f.vendors
            .insert(&VendorPurchase {
                purchase_id: "PUR-1".to_string(),
                vendor: "Cascade Supply".to_string(),
                job_id: Some("JOB-2".to_string()),
                billed_to_job: false,
                amount: 840.0,
                payment_status: crate::domain::types::VendorPaymentStatus::Pending,
                payment_due: Some(now + Duration::days(10)),
                purchased_at: now - Duration::days(6),
            })
            .unwrap();

        let report = f
            .engine
            .run_reconciliation(start, now, &biller(), now, &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(report.return_count, 1);
        assert_eq!(report.vendor_purchase_count, 1);
        assert_eq!(report.vendor_purchase_total, 840.0);
        assert_eq!(report.discrepancies.len(), 2);

        let uncredited = report
            .discrepancies
            .iter()
            .find(|d| d.discrepancy_type == DiscrepancyType::Uncredited)
            .unwrap();
        assert_eq!(uncredited.severity, AlertSeverity::Medium);
        let unbilled = report
            .discrepancies
            .iter()
            .find(|d| d.purchase_id.as_deref() == Some("PUR-1"))
            .unwrap();
        assert_eq!(unbilled.severity, AlertSeverity::High);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let f = fixture();
        let now = Utc::now();
        let start = now - Duration::days(30);
        f.billing
            .insert(&record(
                "BIL-1",
                TransactionType::Delivery,
                BillingStatus::MaterialsOut,
                2500.0,
                now - Duration::days(10),
                Some(now - Duration::days(4)),
            ))
            .unwrap();

        let first = f
            .engine
            .run_reconciliation(start, now, &biller(), now, &AtomicBool::new(false))
            .await
            .unwrap();
        let second = f
            .engine
            .run_reconciliation(start, now, &biller(), now, &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(first.discrepancies, second.discrepancies);
        // dedup: still exactly one active alert
        assert_eq!(f.alerts.list_active().unwrap().len(), 1);
        // both reports archived
        assert_eq!(f.reports.list_recent(10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_alert_write_failure_does_not_abort_run() {
        let f = fixture();
        let now = Utc::now();
        let start = now - Duration::days(30);
        f.billing
            .insert(&record(
                "BIL-1",
                TransactionType::Delivery,
                BillingStatus::MaterialsOut,
                2500.0,
                now - Duration::days(10),
                Some(now - Duration::days(4)),
            ))
            .unwrap();
        // Break the alert store out from under the run.
        f.conn.lock().unwrap().execute("DROP TABLE alert", []).unwrap();

        let report = f
            .engine
            .run_reconciliation(start, now, &biller(), now, &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(report.discrepancies.len(), 1);
        // The report was still archived despite the failed alert write.
        assert_eq!(f.reports.list_recent(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_skips_archive() {
        let f = fixture();
        let now = Utc::now();
        let start = now - Duration::days(30);
        let err = f
            .engine
            .run_reconciliation(start, now, &biller(), now, &AtomicBool::new(true))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(f.reports.list_recent(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_driver_cannot_run() {
        let f = fixture();
        let now = Utc::now();
        let err = f
            .engine
            .run_reconciliation(
                now - Duration::days(1),
                now,
                &Actor::new("dale", Role::Driver),
                now,
                &AtomicBool::new(false),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_inverted_period_rejected() {
        let f = fixture();
        let now = Utc::now();
        let err = f
            .engine
            .run_reconciliation(now, now - Duration::days(1), &biller(), now, &AtomicBool::new(false))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
