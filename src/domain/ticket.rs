// ==========================================
// Roofline Ops - ticket entities
// ==========================================
// A ticket is a unit of delivery/pickup/return work. It is created by order
// intake and mutated only through validated stage transitions; it is never
// deleted, only moved to a terminal stage.
// ==========================================

use crate::domain::types::{TicketStage, TicketType};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// Line item
// ==========================================
/// One material line on a ticket. Quantities are filled in as the ticket
/// moves through its stages (pulled at the warehouse, delivered on site,
/// verified on return). Unit pricing comes from the quote at order intake
/// and flows unchanged into any billing record the ticket produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub description: Option<String>,
    pub ordered_qty: f64,
    pub pulled_qty: Option<f64>,
    pub delivered_qty: Option<f64>,
    pub verified_qty: Option<f64>,
    #[serde(default)]
    pub unit_cost: f64,
    #[serde(default)]
    pub unit_charge: f64,
}

impl LineItem {
    /// Line with no pricing. Billing built from it carries markup 0 and
    /// lands in the approval queue.
    pub fn new(product_id: &str, ordered_qty: f64) -> Self {
        Self {
            product_id: product_id.to_string(),
            description: None,
            ordered_qty,
            pulled_qty: None,
            delivered_qty: None,
            verified_qty: None,
            unit_cost: 0.0,
            unit_charge: 0.0,
        }
    }

    pub fn priced(product_id: &str, ordered_qty: f64, unit_cost: f64, unit_charge: f64) -> Self {
        Self {
            unit_cost,
            unit_charge,
            ..Self::new(product_id, ordered_qty)
        }
    }

    /// Quantity that should flow into billing: best known actual, falling
    /// back to what was ordered.
    pub fn billable_qty(&self) -> f64 {
        self.verified_qty
            .or(self.delivered_qty)
            .or(self.pulled_qty)
            .unwrap_or(self.ordered_qty)
    }
}

// ==========================================
// Stage artifacts
// ==========================================
/// Proof collected when entering a stage (photos, GPS fix, signature).
/// Requirements per stage come from the StageCatalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageArtifacts {
    pub photo_count: u32,
    pub gps_fix: Option<GpsFix>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
}

impl StageArtifacts {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_photos(count: u32) -> Self {
        Self {
            photo_count: count,
            ..Self::default()
        }
    }
}

// ==========================================
// Order intake (external contract)
// ==========================================
/// Payload handed over by the order-intake caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntake {
    pub job_id: String,
    pub job_name: Option<String>,
    pub address: String,
    pub requested_date: Option<NaiveDate>,
    pub urgent: bool,
    pub line_items: Vec<LineItem>,
}

// ==========================================
// Ticket
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub ticket_type: TicketType,
    pub current_stage: TicketStage,
    /// Entry timestamp per stage. Keyed by stage; a stage the ticket never
    /// entered has no entry.
    pub stage_entered_at: HashMap<TicketStage, DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub line_items: Vec<LineItem>,
    pub urgent: bool,
    pub has_issues: bool,
    pub requires_approval: bool,
    pub job_id: String,
    pub job_name: Option<String>,
    pub address: String,
    pub requested_date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency stamp; bumped on every successful mutation.
    pub revision: i64,
}

impl Ticket {
    pub fn is_terminal(&self) -> bool {
        self.current_stage.is_terminal()
    }

    /// When the ticket entered its current stage.
    pub fn entered_current_stage_at(&self) -> Option<DateTime<Utc>> {
        self.stage_entered_at.get(&self.current_stage).copied()
    }
}
