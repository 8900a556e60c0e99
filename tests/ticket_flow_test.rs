// ==========================================
// Ticket workflow integration tests
// ==========================================
// Full stage paths through the portal API: delivery, return, cancellation,
// role enforcement, artifact enforcement.
// ==========================================


#[cfg(test)]
mod ticket_flow_test {
    use chrono::Utc;
    use roofline_ops::domain::permission::Actor;
    use roofline_ops::domain::ticket::{GpsFix, LineItem, OrderIntake, StageArtifacts};
    use roofline_ops::domain::types::{BillingStatus, Role, TicketStage, TicketType, TransactionType};

    use crate::test_helpers::{admin, delivery_intake, dispatcher, driver, setup_portal};

    fn photos(n: u32) -> StageArtifacts {
        StageArtifacts::with_photos(n)
    }

    fn gps() -> StageArtifacts {
        StageArtifacts {
            photo_count: 0,
            gps_fix: Some(GpsFix { lat: 47.61, lon: -122.33 }),
            signature: None,
        }
    }

    fn photo_and_gps() -> StageArtifacts {
        StageArtifacts {
            photo_count: 1,
            gps_fix: Some(GpsFix { lat: 47.61, lon: -122.33 }),
            signature: None,
        }
    }

    fn delivered_proof() -> StageArtifacts {
        StageArtifacts {
            photo_count: 2,
            gps_fix: Some(GpsFix { lat: 47.61, lon: -122.33 }),
            signature: Some("J. Homeowner".to_string()),
        }
    }

    #[tokio::test]
    async fn test_full_delivery_path_with_correct_roles() {
        let (_tmp, conn, portal) = setup_portal();
        let now = Utc::now();

        let submission = portal
            .submit_order(
                TicketType::Delivery,
                delivery_intake("JOB-100", "455 Alder Ct"),
                &dispatcher(),
                now,
            )
            .await
            .unwrap();
        let id = submission.ticket.ticket_id.clone();
        assert_eq!(submission.ticket.current_stage, TicketStage::Created);
        assert_eq!(submission.ticket.revision, 0);

        let warehouse = Actor::new("wally", Role::Warehouse);
        portal
            .transition_ticket(&id, TicketStage::MaterialsPulled, &warehouse, &photos(1), now)
            .await
            .unwrap();
        portal
            .transition_ticket(&id, TicketStage::Loaded, &driver(), &photos(1), now)
            .await
            .unwrap();
        portal
            .transition_ticket(&id, TicketStage::InTransit, &driver(), &gps(), now)
            .await
            .unwrap();
        portal
            .transition_ticket(&id, TicketStage::Delivered, &driver(), &delivered_proof(), now)
            .await
            .unwrap();
        let ticket = portal
            .transition_ticket(&id, TicketStage::Completed, &dispatcher(), &StageArtifacts::none(), now)
            .await
            .unwrap();

        assert_eq!(ticket.current_stage, TicketStage::Completed);
        assert!(ticket.is_terminal());
        assert_eq!(ticket.revision, 5);
        // every visited stage has its entry timestamp
        for stage in [
            TicketStage::Created,
            TicketStage::MaterialsPulled,
            TicketStage::Loaded,
            TicketStage::InTransit,
            TicketStage::Delivered,
            TicketStage::Completed,
        ] {
            assert!(ticket.stage_entered_at.contains_key(&stage), "missing {stage}");
        }

        // completed ticket is no longer active but stays on record
        assert!(portal.list_active_tickets().unwrap().is_empty());
        let tickets = roofline_ops::repository::TicketRepository::from_connection(conn.clone());
        assert_eq!(tickets.list_all().unwrap().len(), 1);

        // delivery reaching Delivered produced a billing record
        let billing = roofline_ops::repository::BillingRepository::from_connection(conn);
        let records = billing.list_by_status(BillingStatus::PendingReview).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction_type, TransactionType::Delivery);
        assert_eq!(records[0].ticket_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_skipping_a_stage_is_rejected() {
        let (_tmp, _conn, portal) = setup_portal();
        let now = Utc::now();
        let id = portal
            .submit_order(
                TicketType::Delivery,
                delivery_intake("JOB-101", "12 Birch Ln"),
                &dispatcher(),
                now,
            )
            .await
            .unwrap()
            .ticket
            .ticket_id;

        let err = portal
            .transition_ticket(&id, TicketStage::Delivered, &admin(), &delivered_proof(), now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");

        // ticket untouched
        let ticket = portal.get_ticket(&id).unwrap();
        assert_eq!(ticket.current_stage, TicketStage::Created);
        assert_eq!(ticket.revision, 0);
    }

    #[tokio::test]
    async fn test_missing_artifacts_block_transition() {
        let (_tmp, _conn, portal) = setup_portal();
        let now = Utc::now();
        let id = portal
            .submit_order(
                TicketType::Delivery,
                delivery_intake("JOB-102", "77 Cedar Way"),
                &dispatcher(),
                now,
            )
            .await
            .unwrap()
            .ticket
            .ticket_id;

        // MaterialsPulled wants a photo
        let err = portal
            .transition_ticket(&id, TicketStage::MaterialsPulled, &admin(), &StageArtifacts::none(), now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_ARTIFACT");

        // with the photo it goes through
        portal
            .transition_ticket(&id, TicketStage::MaterialsPulled, &admin(), &photos(1), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wrong_role_is_rejected() {
        let (_tmp, _conn, portal) = setup_portal();
        let now = Utc::now();
        let id = portal
            .submit_order(
                TicketType::Delivery,
                delivery_intake("JOB-103", "9 Spruce St"),
                &dispatcher(),
                now,
            )
            .await
            .unwrap()
            .ticket
            .ticket_id;

        // pulling materials is warehouse work, not driver work
        let err = portal
            .transition_ticket(&id, TicketStage::MaterialsPulled, &driver(), &photos(1), now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_cancel_then_nothing_more() {
        let (_tmp, _conn, portal) = setup_portal();
        let now = Utc::now();
        let id = portal
            .submit_order(
                TicketType::Delivery,
                delivery_intake("JOB-104", "31 Fir Ave"),
                &dispatcher(),
                now,
            )
            .await
            .unwrap()
            .ticket
            .ticket_id;

        let ticket = portal
            .transition_ticket(&id, TicketStage::Cancelled, &dispatcher(), &StageArtifacts::none(), now)
            .await
            .unwrap();
        assert!(ticket.is_terminal());

        let err = portal
            .transition_ticket(&id, TicketStage::MaterialsPulled, &admin(), &photos(1), now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_return_path_creates_credit_pending_record() {
        let (_tmp, conn, portal) = setup_portal();
        let now = Utc::now();
        let intake = OrderIntake {
            job_id: "JOB-105".to_string(),
            job_name: Some("Oak Hill return".to_string()),
            address: "88 Oak Hill Rd".to_string(),
            requested_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 20),
            urgent: false,
            line_items: vec![LineItem::priced("RIDGE-CAP", 6.0, 18.0, 24.0)],
        };
        let id = portal
            .submit_order(TicketType::Return, intake, &dispatcher(), now)
            .await
            .unwrap()
            .ticket
            .ticket_id;

        portal
            .transition_ticket(&id, TicketStage::InTransit, &driver(), &gps(), now)
            .await
            .unwrap();
        portal
            .transition_ticket(&id, TicketStage::PickedUp, &driver(), &photo_and_gps(), now)
            .await
            .unwrap();
        let warehouse = Actor::new("wally", Role::Warehouse);
        portal
            .transition_ticket(&id, TicketStage::ReturnedToYard, &warehouse, &StageArtifacts::none(), now)
            .await
            .unwrap();
        portal
            .transition_ticket(&id, TicketStage::Verified, &warehouse, &photos(1), now)
            .await
            .unwrap();

        // the verified return produced a credit-pending billing record
        let billing = roofline_ops::repository::BillingRepository::from_connection(conn);
        let records = billing.list_by_status(BillingStatus::CreditPending).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transaction_type, TransactionType::Return);
        assert_eq!(records[0].ticket_id.as_deref(), Some(id.as_str()));
    }
}
