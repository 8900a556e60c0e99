// ==========================================
// Roofline Ops - billing entities
// ==========================================
// A billing record is the monetary representation of a ticket's materials,
// tracked through its own status lifecycle. Money is held at full precision
// internally; rounding to cents happens only at the serialization boundary
// (InvoiceView).
// ==========================================

use crate::domain::types::{
    BillingStatus, CustomerPaymentStatus, TransactionType, VendorPaymentStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Material line
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub product_id: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_cost: f64,
    pub unit_charge: f64,
}

impl MaterialLine {
    pub fn new(product_id: &str, quantity: f64, unit_cost: f64, unit_charge: f64) -> Self {
        Self {
            product_id: product_id.to_string(),
            description: None,
            quantity,
            unit_cost,
            unit_charge,
        }
    }

    pub fn line_cost(&self) -> f64 {
        self.unit_cost * self.quantity
    }

    pub fn line_charge(&self) -> f64 {
        self.unit_charge * self.quantity
    }
}

// ==========================================
// Status history
// ==========================================
/// Append-only audit trail; the sole source of truth for who moved a record
/// when and why. Exactly one entry per successful status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub from_status: Option<BillingStatus>,
    pub to_status: BillingStatus,
    pub actor: String,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

// ==========================================
// Billing record
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingRecord {
    pub billing_id: String,
    pub ticket_id: Option<String>,
    pub job_id: Option<String>,
    pub transaction_type: TransactionType,
    pub billing_status: BillingStatus,
    pub lines: Vec<MaterialLine>,
    pub total_cost: f64,
    pub total_charge: f64,
    /// Full-precision markup percent; display rounding via markup_display().
    pub markup_pct: f64,
    pub requires_approval: bool,
    pub approval_reason: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub billed_by: Option<String>,
    pub billed_at: Option<DateTime<Utc>>,
    /// Unset until materials first leave the warehouse; once set it only
    /// moves forward in time.
    pub billing_deadline: Option<DateTime<Utc>>,
    pub customer_payment_status: CustomerPaymentStatus,
    pub vendor_payment_status: Option<VendorPaymentStatus>,
    pub vendor: Option<String>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: i64,
}

impl BillingRecord {
    /// Markup percent rounded to one decimal, for display only.
    pub fn markup_display(&self) -> f64 {
        (self.markup_pct * 10.0).round() / 10.0
    }

    /// Read-only structure handed to the invoice renderer. The only place
    /// money is rounded to cents.
    pub fn invoice_view(&self) -> InvoiceView {
        let items: Vec<InvoiceItem> = self
            .lines
            .iter()
            .map(|line| InvoiceItem {
                product_id: line.product_id.clone(),
                description: line.description.clone(),
                quantity: line.quantity,
                unit_charge: round_cents(line.unit_charge),
                amount: round_cents(line.line_charge()),
            })
            .collect();
        let subtotal = round_cents(self.total_charge);
        InvoiceView {
            items,
            subtotal,
            fees: 0.0,
            total: subtotal,
        }
    }
}

/// Round a money amount to cents. Serialization-boundary helper only.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

// ==========================================
// Invoice view (external rendering contract)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceView {
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub fees: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub product_id: String,
    pub description: Option<String>,
    pub quantity: f64,
    pub unit_charge: f64,
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(10.005), 10.01);
        assert_eq!(round_cents(10.004), 10.0);
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
    }

    #[test]
    fn test_line_totals() {
        let line = MaterialLine::new("UNDERLAYMENT", 10.0, 5.0, 6.0);
        assert_eq!(line.line_cost(), 50.0);
        assert_eq!(line.line_charge(), 60.0);
    }
}
