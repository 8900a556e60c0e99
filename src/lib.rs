// ==========================================
// Roofline Ops - core library
// ==========================================
// Operations backbone for a roofing materials distributor: ticket stage
// workflow, billing lifecycle, SLA monitoring and period reconciliation
// over SQLite.
// ==========================================

// ==========================================
// Module declarations
// ==========================================

// Domain layer: entities and types
pub mod domain;

// Repository layer: data access
pub mod repository;

// Engine layer: business rules
pub mod engine;

// Configuration layer
pub mod config;

// Database infrastructure (connection init / unified PRAGMAs)
pub mod db;

// Logging
pub mod logging;

// API layer
pub mod api;

// ==========================================
// Re-exports
// ==========================================

pub use domain::types::{
    AlertSeverity, AlertType, BillingStatus, CustomerPaymentStatus, Role, TicketStage, TicketType,
    TransactionType, VendorPaymentStatus,
};

pub use domain::{
    Actor, Alert, BillingRecord, Discrepancy, DiscrepancyType, LineItem, MaterialLine,
    OrderIntake, ReconciliationReport, StageArtifacts, StageCatalog, Ticket, VendorPurchase,
};

pub use api::{ApiError, ApiResult, PortalApi};
pub use engine::{
    BillingLifecycleEngine, EngineError, EngineResult, ReconciliationEngine, SlaMonitor,
    TicketStateMachine,
};

/// Crate version, from Cargo metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name used for data directories and log lines.
pub const APP_NAME: &str = "roofline-ops";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "roofline-ops");
    }
}
