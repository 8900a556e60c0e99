// ==========================================
// Roofline Ops - engine layer
// ==========================================
// Business logic over the repositories: ticket stage state machine, billing
// lifecycle, SLA monitoring and period reconciliation. Engines hold no
// mutable state of their own; every operation takes the clock as a
// parameter and goes through the repository layer for persistence.
// ==========================================

pub mod billing;
pub mod error;
pub mod events;
pub mod notify;
pub mod reconciliation;
pub mod sla;
pub mod ticket_state;

pub use billing::{compute_totals, BillingLifecycleEngine, NewBillingRecord};
pub use error::{EngineError, EngineResult};
pub use events::{BufferedEventPublisher, TicketEvent, TicketEventPublisher};
pub use notify::{notify_best_effort, LogNotifier, Notifier};
pub use reconciliation::ReconciliationEngine;
pub use sla::{DailyCheckSummary, InventoryLevel, SlaMonitor};
pub use ticket_state::TicketStateMachine;
