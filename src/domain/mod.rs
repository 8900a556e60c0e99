// ==========================================
// Roofline Ops - domain layer
// ==========================================
// Entities and canonical types. No storage access, no engine logic.
// ==========================================

pub mod alert;
pub mod billing;
pub mod id;
pub mod permission;
pub mod reconciliation;
pub mod stage;
pub mod ticket;
pub mod types;
pub mod vendor;

pub use alert::Alert;
pub use billing::{BillingRecord, InvoiceItem, InvoiceView, MaterialLine, StatusHistoryEntry};
pub use id::{IdGenerator, SequenceIdGenerator, UuidIdGenerator};
pub use permission::{is_permitted, Actor, Permission};
pub use reconciliation::{Discrepancy, DiscrepancyType, ReconciliationReport};
pub use stage::{StageCatalog, StageDefinition};
pub use ticket::{GpsFix, LineItem, OrderIntake, StageArtifacts, Ticket};
pub use vendor::VendorPurchase;
