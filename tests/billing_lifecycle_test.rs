// ==========================================
// Billing lifecycle integration tests
// ==========================================
// Full status paths through the portal API, configured thresholds read from
// the database, and payment status side effects.
// ==========================================


#[cfg(test)]
mod billing_lifecycle_test {
    use chrono::Utc;
    use roofline_ops::config::config_manager::keys;
    use roofline_ops::config::ConfigManager;
    use roofline_ops::domain::billing::MaterialLine;
    use roofline_ops::domain::types::{BillingStatus, CustomerPaymentStatus, TransactionType};
    use roofline_ops::engine::NewBillingRecord;

    use crate::test_helpers::{biller, setup_portal};

    fn delivery(lines: Vec<MaterialLine>) -> NewBillingRecord {
        NewBillingRecord {
            lines,
            transaction_type: TransactionType::Delivery,
            vendor: None,
            ticket_id: Some("TKT-1".to_string()),
            job_id: Some("JOB-1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle_to_paid() {
        let (_tmp, _conn, portal) = setup_portal();
        let now = Utc::now();
        let record = portal
            .create_billing(
                delivery(vec![MaterialLine::new("SHINGLE-ARCH", 40.0, 32.0, 41.0)]),
                &biller(),
                now,
            )
            .await
            .unwrap();
        assert_eq!(record.billing_status, BillingStatus::PendingReview);
        assert!(!record.requires_approval);
        assert_eq!(record.customer_payment_status, CustomerPaymentStatus::Unbilled);

        let mut record = record;
        for status in [
            BillingStatus::Approved,
            BillingStatus::MaterialsOut,
            BillingStatus::Delivered,
            BillingStatus::PendingBilling,
            BillingStatus::Billed,
            BillingStatus::Paid,
        ] {
            record = portal
                .update_billing_status(&record.billing_id, status, &biller(), None, now)
                .await
                .unwrap();
        }

        assert_eq!(record.billing_status, BillingStatus::Paid);
        assert_eq!(record.customer_payment_status, CustomerPaymentStatus::Paid);
        assert!(record.billing_deadline.is_some());
        assert_eq!(record.billed_by.as_deref(), Some("bea"));
        // one creation entry plus six transitions
        assert_eq!(record.status_history.len(), 7);
        assert_eq!(record.revision, 6);
    }

    #[tokio::test]
    async fn test_flagged_rework_path() {
        let (_tmp, _conn, portal) = setup_portal();
        let now = Utc::now();
        let record = portal
            .create_billing(
                delivery(vec![MaterialLine::new("UNDERLAYMENT", 10.0, 20.0, 25.0)]),
                &biller(),
                now,
            )
            .await
            .unwrap();

        let record = portal
            .update_billing_status(
                &record.billing_id,
                BillingStatus::Flagged,
                &biller(),
                Some("price check"),
                now,
            )
            .await
            .unwrap();
        assert_eq!(record.billing_status, BillingStatus::Flagged);
        let last = record.status_history.last().unwrap();
        assert_eq!(last.reason.as_deref(), Some("price check"));

        // flagged records go back through approval
        let record = portal
            .update_billing_status(&record.billing_id, BillingStatus::Approved, &biller(), None, now)
            .await
            .unwrap();
        assert_eq!(record.billing_status, BillingStatus::Approved);
    }

    #[tokio::test]
    async fn test_configured_threshold_changes_approval() {
        let (_tmp, conn, portal) = setup_portal();
        let now = Utc::now();

        // 40 * 41 = 1640: under the default 5000 limit
        let record = portal
            .create_billing(
                delivery(vec![MaterialLine::new("SHINGLE-ARCH", 40.0, 32.0, 41.0)]),
                &biller(),
                now,
            )
            .await
            .unwrap();
        assert!(!record.requires_approval);

        // tighten the limit below that total
        let config = ConfigManager::from_connection(conn).unwrap();
        config.set_config_value(keys::APPROVAL_CHARGE_LIMIT, "1000").unwrap();

        let record = portal
            .create_billing(
                delivery(vec![MaterialLine::new("SHINGLE-ARCH", 40.0, 32.0, 41.0)]),
                &biller(),
                now,
            )
            .await
            .unwrap();
        assert!(record.requires_approval);
        assert!(record.approval_reason.unwrap().contains("High value"));
    }

    #[tokio::test]
    async fn test_terminal_statuses_reject_further_moves() {
        let (_tmp, _conn, portal) = setup_portal();
        let now = Utc::now();
        let record = portal
            .create_billing(
                delivery(vec![MaterialLine::new("DRIP-EDGE", 10.0, 4.0, 5.0)]),
                &biller(),
                now,
            )
            .await
            .unwrap();
        let record = portal
            .update_billing_status(&record.billing_id, BillingStatus::Flagged, &biller(), Some("duplicate"), now)
            .await
            .unwrap();
        let record = portal
            .update_billing_status(&record.billing_id, BillingStatus::WriteOff, &biller(), None, now)
            .await
            .unwrap();
        assert!(record.billing_status.is_terminal());

        let err = portal
            .update_billing_status(&record.billing_id, BillingStatus::Approved, &biller(), None, now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_credit_path_for_returns() {
        let (_tmp, _conn, portal) = setup_portal();
        let now = Utc::now();
        let record = portal
            .create_billing(
                NewBillingRecord {
                    lines: vec![MaterialLine::new("RIDGE-CAP", 6.0, 18.0, 22.0)],
                    transaction_type: TransactionType::Return,
                    vendor: None,
                    ticket_id: None,
                    job_id: Some("JOB-2".to_string()),
                },
                &biller(),
                now,
            )
            .await
            .unwrap();
        assert_eq!(record.billing_status, BillingStatus::CreditPending);

        let record = portal
            .update_billing_status(&record.billing_id, BillingStatus::Credited, &biller(), None, now)
            .await
            .unwrap();
        assert_eq!(record.customer_payment_status, CustomerPaymentStatus::Credited);
        assert!(record.billing_status.is_terminal());
    }
}
