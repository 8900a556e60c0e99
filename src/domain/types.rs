// ==========================================
// Roofline Ops - domain type definitions
// ==========================================
// Serialized form: SCREAMING_SNAKE_CASE (matches database columns)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Ticket type
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    Delivery,
    Pickup,
    Return,
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl TicketType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DELIVERY" => Some(TicketType::Delivery),
            "PICKUP" => Some(TicketType::Pickup),
            "RETURN" => Some(TicketType::Return),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TicketType::Delivery => "DELIVERY",
            TicketType::Pickup => "PICKUP",
            TicketType::Return => "RETURN",
        }
    }
}

// ==========================================
// Ticket stage
// ==========================================
// One canonical enumeration for all ticket types; which stages apply to a
// given type, and in which order, is defined by the StageCatalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStage {
    Created,
    MaterialsPulled,
    Loaded,
    InTransit,
    Delivered,
    PickedUp,
    ReturnedToYard,
    Verified,
    Completed,
    Cancelled,
}

impl fmt::Display for TicketStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl TicketStage {
    /// Terminal stages accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStage::Completed | TicketStage::Cancelled)
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CREATED" => Some(TicketStage::Created),
            "MATERIALS_PULLED" => Some(TicketStage::MaterialsPulled),
            "LOADED" => Some(TicketStage::Loaded),
            "IN_TRANSIT" => Some(TicketStage::InTransit),
            "DELIVERED" => Some(TicketStage::Delivered),
            "PICKED_UP" => Some(TicketStage::PickedUp),
            "RETURNED_TO_YARD" => Some(TicketStage::ReturnedToYard),
            "VERIFIED" => Some(TicketStage::Verified),
            "COMPLETED" => Some(TicketStage::Completed),
            "CANCELLED" => Some(TicketStage::Cancelled),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TicketStage::Created => "CREATED",
            TicketStage::MaterialsPulled => "MATERIALS_PULLED",
            TicketStage::Loaded => "LOADED",
            TicketStage::InTransit => "IN_TRANSIT",
            TicketStage::Delivered => "DELIVERED",
            TicketStage::PickedUp => "PICKED_UP",
            TicketStage::ReturnedToYard => "RETURNED_TO_YARD",
            TicketStage::Verified => "VERIFIED",
            TicketStage::Completed => "COMPLETED",
            TicketStage::Cancelled => "CANCELLED",
        }
    }
}

// ==========================================
// Billing status
// ==========================================
// The adjacency graph lives in allowed_successors(); transitions outside it
// are rejected, never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingStatus {
    PendingReview,
    Approved,
    MaterialsOut,
    Delivered,
    PendingBilling,
    Billed,
    Paid,
    CreditPending,
    Credited,
    Disputed,
    Flagged,
    WriteOff,
}

impl fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl BillingStatus {
    /// Directed edges of the billing status graph.
    pub fn allowed_successors(&self) -> &'static [BillingStatus] {
        use BillingStatus::*;
        match self {
            PendingReview => &[Approved, Flagged, CreditPending],
            Approved => &[MaterialsOut, Flagged],
            MaterialsOut => &[Delivered, Flagged],
            Delivered => &[PendingBilling, CreditPending, Flagged],
            PendingBilling => &[Billed, Flagged, Disputed],
            Billed => &[Paid, Disputed, CreditPending],
            Paid => &[CreditPending],
            CreditPending => &[Credited, Disputed],
            Disputed => &[PendingBilling, WriteOff, Flagged],
            Flagged => &[PendingReview, Approved, WriteOff],
            Credited | WriteOff => &[],
        }
    }

    /// Pure predicate over the status graph.
    pub fn can_transition_to(&self, target: BillingStatus) -> bool {
        self.allowed_successors().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BillingStatus::Credited | BillingStatus::WriteOff)
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING_REVIEW" => Some(BillingStatus::PendingReview),
            "APPROVED" => Some(BillingStatus::Approved),
            "MATERIALS_OUT" => Some(BillingStatus::MaterialsOut),
            "DELIVERED" => Some(BillingStatus::Delivered),
            "PENDING_BILLING" => Some(BillingStatus::PendingBilling),
            "BILLED" => Some(BillingStatus::Billed),
            "PAID" => Some(BillingStatus::Paid),
            "CREDIT_PENDING" => Some(BillingStatus::CreditPending),
            "CREDITED" => Some(BillingStatus::Credited),
            "DISPUTED" => Some(BillingStatus::Disputed),
            "FLAGGED" => Some(BillingStatus::Flagged),
            "WRITE_OFF" => Some(BillingStatus::WriteOff),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            BillingStatus::PendingReview => "PENDING_REVIEW",
            BillingStatus::Approved => "APPROVED",
            BillingStatus::MaterialsOut => "MATERIALS_OUT",
            BillingStatus::Delivered => "DELIVERED",
            BillingStatus::PendingBilling => "PENDING_BILLING",
            BillingStatus::Billed => "BILLED",
            BillingStatus::Paid => "PAID",
            BillingStatus::CreditPending => "CREDIT_PENDING",
            BillingStatus::Credited => "CREDITED",
            BillingStatus::Disputed => "DISPUTED",
            BillingStatus::Flagged => "FLAGGED",
            BillingStatus::WriteOff => "WRITE_OFF",
        }
    }
}

// ==========================================
// Transaction type
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Delivery,
    Return,
    StockPurchase,
    StockReturn,
    Transfer,
    Adjustment,
    Loss,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl TransactionType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DELIVERY" => Some(TransactionType::Delivery),
            "RETURN" => Some(TransactionType::Return),
            "STOCK_PURCHASE" => Some(TransactionType::StockPurchase),
            "STOCK_RETURN" => Some(TransactionType::StockReturn),
            "TRANSFER" => Some(TransactionType::Transfer),
            "ADJUSTMENT" => Some(TransactionType::Adjustment),
            "LOSS" => Some(TransactionType::Loss),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TransactionType::Delivery => "DELIVERY",
            TransactionType::Return => "RETURN",
            TransactionType::StockPurchase => "STOCK_PURCHASE",
            TransactionType::StockReturn => "STOCK_RETURN",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Loss => "LOSS",
        }
    }
}

// ==========================================
// Alert type
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    SlaWarning,
    SlaViolation,
    Bottleneck,
    Duplicate,
    LowStock,
    ApprovalRequired,
    OverdueBilling,
    VendorPaymentDue,
    LossDetected,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl AlertType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SLA_WARNING" => Some(AlertType::SlaWarning),
            "SLA_VIOLATION" => Some(AlertType::SlaViolation),
            "BOTTLENECK" => Some(AlertType::Bottleneck),
            "DUPLICATE" => Some(AlertType::Duplicate),
            "LOW_STOCK" => Some(AlertType::LowStock),
            "APPROVAL_REQUIRED" => Some(AlertType::ApprovalRequired),
            "OVERDUE_BILLING" => Some(AlertType::OverdueBilling),
            "VENDOR_PAYMENT_DUE" => Some(AlertType::VendorPaymentDue),
            "LOSS_DETECTED" => Some(AlertType::LossDetected),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AlertType::SlaWarning => "SLA_WARNING",
            AlertType::SlaViolation => "SLA_VIOLATION",
            AlertType::Bottleneck => "BOTTLENECK",
            AlertType::Duplicate => "DUPLICATE",
            AlertType::LowStock => "LOW_STOCK",
            AlertType::ApprovalRequired => "APPROVAL_REQUIRED",
            AlertType::OverdueBilling => "OVERDUE_BILLING",
            AlertType::VendorPaymentDue => "VENDOR_PAYMENT_DUE",
            AlertType::LossDetected => "LOSS_DETECTED",
        }
    }
}

// ==========================================
// Alert severity
// ==========================================
// Order: Low < Medium < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl AlertSeverity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LOW" => Some(AlertSeverity::Low),
            "MEDIUM" => Some(AlertSeverity::Medium),
            "HIGH" => Some(AlertSeverity::High),
            "CRITICAL" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "LOW",
            AlertSeverity::Medium => "MEDIUM",
            AlertSeverity::High => "HIGH",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

// ==========================================
// Payment sub-statuses
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerPaymentStatus {
    Unbilled,
    Billed,
    Paid,
    Credited,
}

impl CustomerPaymentStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "UNBILLED" => Some(CustomerPaymentStatus::Unbilled),
            "BILLED" => Some(CustomerPaymentStatus::Billed),
            "PAID" => Some(CustomerPaymentStatus::Paid),
            "CREDITED" => Some(CustomerPaymentStatus::Credited),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            CustomerPaymentStatus::Unbilled => "UNBILLED",
            CustomerPaymentStatus::Billed => "BILLED",
            CustomerPaymentStatus::Paid => "PAID",
            CustomerPaymentStatus::Credited => "CREDITED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VendorPaymentStatus {
    Pending,
    Paid,
}

impl VendorPaymentStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(VendorPaymentStatus::Pending),
            "PAID" => Some(VendorPaymentStatus::Paid),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            VendorPaymentStatus::Pending => "PENDING",
            VendorPaymentStatus::Paid => "PAID",
        }
    }
}

// ==========================================
// Actor roles
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Dispatcher,
    Warehouse,
    Driver,
    Billing,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "DISPATCHER" => Some(Role::Dispatcher),
            "WAREHOUSE" => Some(Role::Warehouse),
            "DRIVER" => Some(Role::Driver),
            "BILLING" => Some(Role::Billing),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Dispatcher => "DISPATCHER",
            Role::Warehouse => "WAREHOUSE",
            Role::Driver => "DRIVER",
            Role::Billing => "BILLING",
        }
    }
}

// ==========================================
// Notification priority
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyPriority {
    Normal,
    Urgent,
}
