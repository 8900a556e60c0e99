// ==========================================
// Roofline Ops - vendor purchase entity
// ==========================================

use crate::domain::types::VendorPaymentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A purchase made from a material vendor. Purchases tied to a job should be
/// billed through to that job; reconciliation flags the ones that were not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorPurchase {
    pub purchase_id: String,
    pub vendor: String,
    pub job_id: Option<String>,
    pub billed_to_job: bool,
    pub amount: f64,
    pub payment_status: VendorPaymentStatus,
    pub payment_due: Option<DateTime<Utc>>,
    pub purchased_at: DateTime<Utc>,
}
