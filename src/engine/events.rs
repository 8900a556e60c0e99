// ==========================================
// Roofline Ops - engine event publishing
// ==========================================
// The state machine publishes stage-entered events; downstream consumers
// (billing, SLA monitoring) subscribe through the trait. The engine layer
// defines the trait so it does not depend on its consumers.
// ==========================================

use crate::domain::types::{TicketStage, TicketType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emitted each time a ticket enters a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketEvent {
    pub ticket_id: String,
    pub ticket_type: TicketType,
    pub job_id: String,
    pub stage: TicketStage,
    pub entered_at: DateTime<Utc>,
    pub actor: String,
}

/// Consumer side of stage-entered events. Publishing failures must not fail
/// the transition that produced the event; callers log and continue.
pub trait TicketEventPublisher: Send + Sync {
    fn publish(&self, event: &TicketEvent) -> anyhow::Result<()>;
}

/// Collects events in memory. Used by tests and by callers that drain events
/// into the billing engine after a transition commits.
#[derive(Debug, Default)]
pub struct BufferedEventPublisher {
    events: std::sync::Mutex<Vec<TicketEvent>>,
}

impl BufferedEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<TicketEvent> {
        match self.events.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl TicketEventPublisher for BufferedEventPublisher {
    fn publish(&self, event: &TicketEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|e| anyhow::anyhow!("event buffer poisoned: {}", e))?
            .push(event.clone());
        Ok(())
    }
}
