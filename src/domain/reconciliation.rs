// ==========================================
// Roofline Ops - reconciliation report
// ==========================================
// Immutable snapshot of a period comparison between deliveries, credits and
// vendor purchases. Created on demand, archived, never mutated.
// ==========================================

use crate::domain::types::AlertSeverity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Discrepancy
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscrepancyType {
    /// Delivery past its billing deadline and still unbilled, or a vendor
    /// purchase tied to a job but never billed through.
    Unbilled,
    /// Return that never reached CREDITED.
    Uncredited,
    /// Loss-type adjustment recorded in the period.
    Loss,
}

impl fmt::Display for DiscrepancyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscrepancyType::Unbilled => write!(f, "UNBILLED"),
            DiscrepancyType::Uncredited => write!(f, "UNCREDITED"),
            DiscrepancyType::Loss => write!(f, "LOSS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub discrepancy_type: DiscrepancyType,
    pub job_id: Option<String>,
    pub billing_id: Option<String>,
    pub purchase_id: Option<String>,
    pub description: String,
    pub amount: f64,
    pub severity: AlertSeverity,
}

// ==========================================
// Reconciliation report
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub report_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub delivery_count: usize,
    pub delivery_total: f64,
    pub return_count: usize,
    pub return_total: f64,
    pub vendor_purchase_count: usize,
    pub vendor_purchase_total: f64,
    pub discrepancies: Vec<Discrepancy>,
}
