// ==========================================
// SLA monitor integration tests
// ==========================================
// The nightly sweep over a seeded database: overdue billing escalation,
// vendor payments coming due, stuck tickets and stage bottlenecks.
// ==========================================


#[cfg(test)]
mod sla_monitor_test {
    use chrono::{Duration, Utc};
    use roofline_ops::domain::billing::{BillingRecord, MaterialLine, StatusHistoryEntry};
    use roofline_ops::domain::ticket::StageArtifacts;
    use roofline_ops::domain::types::{
        AlertSeverity, AlertType, BillingStatus, CustomerPaymentStatus, TicketStage, TicketType,
        TransactionType, VendorPaymentStatus,
    };
    use roofline_ops::domain::vendor::VendorPurchase;
    use roofline_ops::repository::{AlertRepository, BillingRepository, VendorPurchaseRepository};
    use std::sync::atomic::AtomicBool;

    use crate::test_helpers::{delivery_intake, dispatcher, setup_portal};

    fn unbilled_record(id: &str, deadline_days_ago: i64) -> BillingRecord {
        let now = Utc::now();
        let created_at = now - Duration::days(deadline_days_ago + 5);
        BillingRecord {
            billing_id: id.to_string(),
            ticket_id: None,
            job_id: Some("JOB-1".to_string()),
            transaction_type: TransactionType::Delivery,
            billing_status: BillingStatus::Delivered,
            lines: vec![MaterialLine::new("SHINGLE-ARCH", 40.0, 32.0, 41.0)],
            total_cost: 1280.0,
            total_charge: 1640.0,
            markup_pct: 28.1,
            requires_approval: false,
            approval_reason: None,
            approved_by: Some("bea".to_string()),
            approved_at: Some(created_at),
            billed_by: None,
            billed_at: None,
            billing_deadline: Some(now - Duration::days(deadline_days_ago)),
            customer_payment_status: CustomerPaymentStatus::Unbilled,
            vendor_payment_status: None,
            vendor: None,
            status_history: vec![StatusHistoryEntry {
                from_status: None,
                to_status: BillingStatus::PendingReview,
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

    #[tokio::test]
    async fn test_daily_check_escalates_overdue_billing() {
        let (_tmp, conn, portal) = setup_portal();
        let billing = BillingRepository::from_connection(conn.clone());
        let alerts = AlertRepository::from_connection(conn);

        // ten days overdue: critical; two days overdue: high
        billing.insert(&unbilled_record("BIL-OLD", 10)).unwrap();
        billing.insert(&unbilled_record("BIL-NEW", 2)).unwrap();

        let summary = portal
            .run_daily_check(Utc::now(), &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(summary.overdue_items, 2);
        assert!(summary.issues.is_empty());

        let active = alerts.list_active().unwrap();
        assert_eq!(active.len(), 2);
        let severity_of = |billing_id: &str| {
            active
                .iter()
                .find(|a| a.billing_id.as_deref() == Some(billing_id))
                .unwrap()
                .severity
        };
        assert_eq!(severity_of("BIL-OLD"), AlertSeverity::Critical);
        assert_eq!(severity_of("BIL-NEW"), AlertSeverity::High);

        // second sweep: same problems, no new alerts
        let summary = portal
            .run_daily_check(Utc::now(), &AtomicBool::new(false))
            .await
            .unwrap();
        assert_eq!(summary.alerts_created, 0);
    }

    #[tokio::test]
    async fn test_daily_check_flags_vendor_payment_due() {
        let (_tmp, conn, portal) = setup_portal();
        let vendors = VendorPurchaseRepository::from_connection(conn.clone());
        let alerts = AlertRepository::from_connection(conn);
        let now = Utc::now();

        vendors
            .insert(&VendorPurchase {
                purchase_id: "PUR-1".to_string(),
                vendor: "Cascade Supply".to_string(),
                job_id: None,
                billed_to_job: false,
                amount: 620.0,
                payment_status: VendorPaymentStatus::Pending,
                payment_due: Some(now - Duration::days(1)),
                purchased_at: now - Duration::days(20),
            })
            .unwrap();
        // not yet due: ignored
        vendors
            .insert(&VendorPurchase {
                purchase_id: "PUR-2".to_string(),
                vendor: "Cascade Supply".to_string(),
                job_id: None,
                billed_to_job: false,
                amount: 120.0,
                payment_status: VendorPaymentStatus::Pending,
                payment_due: Some(now + Duration::days(10)),
                purchased_at: now - Duration::days(2),
            })
            .unwrap();

        let summary = portal.run_daily_check(now, &AtomicBool::new(false)).await.unwrap();
        assert_eq!(summary.overdue_items, 1);

        let active = alerts.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].alert_type, AlertType::VendorPaymentDue);
        assert_eq!(active[0].context_key.as_deref(), Some("PUR-1"));
    }

    #[tokio::test]
    async fn test_bottleneck_detected_across_stuck_tickets() {
        let (_tmp, conn, portal) = setup_portal();
        let alerts = AlertRepository::from_connection(conn);
        let start = Utc::now() - Duration::hours(6);

        // four tickets pulled into MaterialsPulled six hours ago
        let warehouse = roofline_ops::domain::permission::Actor::new(
            "wally",
            roofline_ops::domain::types::Role::Warehouse,
        );
        for i in 0..4 {
            let id = portal
                .submit_order(
                    TicketType::Delivery,
                    delivery_intake(&format!("JOB-{i}"), &format!("{i} Alder Ct")),
                    &dispatcher(),
                    start,
                )
                .await
                .unwrap()
                .ticket
                .ticket_id;
            portal
                .transition_ticket(
                    &id,
                    TicketStage::MaterialsPulled,
                    &warehouse,
                    &StageArtifacts::with_photos(1),
                    start,
                )
                .await
                .unwrap();
        }

        let summary = portal
            .run_daily_check(Utc::now(), &AtomicBool::new(false))
            .await
            .unwrap();
        // one SLA warning per ticket plus one bottleneck alert
        assert_eq!(summary.alerts_created, 5);

        let active = alerts.list_active().unwrap();
        let bottlenecks: Vec<_> = active
            .iter()
            .filter(|a| a.alert_type == AlertType::Bottleneck)
            .collect();
        assert_eq!(bottlenecks.len(), 1);
        assert_eq!(bottlenecks[0].severity, AlertSeverity::Medium);
        assert!(bottlenecks[0].message.contains("4 tickets waiting"));
    }

    #[tokio::test]
    async fn test_cancel_flag_stops_sweep_with_partial_summary() {
        let (_tmp, conn, portal) = setup_portal();
        let billing = BillingRepository::from_connection(conn.clone());
        let alerts = AlertRepository::from_connection(conn);
        billing.insert(&unbilled_record("BIL-OLD", 10)).unwrap();

        // Cancelled before any item: counters cover only completed work.
        let summary = portal
            .run_daily_check(Utc::now(), &AtomicBool::new(true))
            .await
            .unwrap();
        assert_eq!(summary.overdue_items, 0);
        assert_eq!(summary.alerts_created, 0);
        assert!(alerts.list_active().unwrap().is_empty());
    }
}
