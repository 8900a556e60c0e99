// ==========================================
// Roofline Ops - ticket state machine
// ==========================================
// Validates and applies ticket stage transitions. Transitions move only
// along StageCatalog edges (plus cancellation from any non-terminal stage),
// stamp entry timestamps, and check the target stage's required artifacts.
// Tickets are mutated here and nowhere else.
// ==========================================

use crate::domain::id::IdGenerator;
use crate::domain::permission::{is_permitted, Actor, Permission};
use crate::domain::stage::{StageCatalog, StageDefinition};
use crate::domain::ticket::{OrderIntake, StageArtifacts, Ticket};
use crate::domain::types::{NotifyPriority, Role, TicketStage, TicketType};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{TicketEvent, TicketEventPublisher};
use crate::engine::notify::{notify_best_effort, Notifier};
use crate::repository::TicketRepository;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct TicketStateMachine {
    tickets: Arc<TicketRepository>,
    catalog: Arc<StageCatalog>,
    notifier: Arc<dyn Notifier>,
    ids: Arc<dyn IdGenerator>,
    events: Arc<dyn TicketEventPublisher>,
}

impl TicketStateMachine {
    pub fn new(
        tickets: Arc<TicketRepository>,
        catalog: Arc<StageCatalog>,
        notifier: Arc<dyn Notifier>,
        ids: Arc<dyn IdGenerator>,
        events: Arc<dyn TicketEventPublisher>,
    ) -> Self {
        Self {
            tickets,
            catalog,
            notifier,
            ids,
            events,
        }
    }

    /// Create a ticket from an intake order. The ticket starts at the first
    /// stage of its type with the entry timestamp stamped.
    pub async fn create_ticket(
        &self,
        ticket_type: TicketType,
        intake: OrderIntake,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> EngineResult<Ticket> {
        if !is_permitted(actor, Permission::SubmitOrder) {
            return Err(EngineError::Validation(format!(
                "role {} may not submit orders",
                actor.role
            )));
        }
        if intake.line_items.is_empty() {
            return Err(EngineError::Validation("order has no line items".to_string()));
        }
        if let Some(bad) = intake.line_items.iter().find(|l| l.ordered_qty <= 0.0) {
            return Err(EngineError::Validation(format!(
                "line {} has non-positive quantity",
                bad.product_id
            )));
        }
        if intake.address.trim().is_empty() {
            return Err(EngineError::Validation("order has no address".to_string()));
        }

        let first_stage = self.catalog.first_stage(ticket_type);
        let mut stage_entered_at = HashMap::new();
        stage_entered_at.insert(first_stage, now);

        let ticket = Ticket {
            ticket_id: self.ids.next_id("TKT"),
            ticket_type,
            current_stage: first_stage,
            stage_entered_at,
            assigned_to: None,
            line_items: intake.line_items,
            urgent: intake.urgent,
            has_issues: false,
            requires_approval: false,
            job_id: intake.job_id,
            job_name: intake.job_name,
            address: intake.address,
            requested_date: intake.requested_date,
            created_by: actor.actor_id.clone(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };

        self.tickets.insert(&ticket)?;
        info!(
            ticket_id = %ticket.ticket_id,
            ticket_type = %ticket_type,
            job_id = %ticket.job_id,
            "ticket created"
        );

        if let Some(def) = self.catalog.definition(ticket_type, first_stage) {
            self.notify_stage_entry(&ticket, def).await;
        }

        Ok(ticket)
    }

    /// Pure predicate, shared with tests and callers that want to probe the
    /// stage graph without mutating anything.
    pub fn is_valid_transition(
        &self,
        ticket_type: TicketType,
        from: TicketStage,
        to: TicketStage,
    ) -> bool {
        self.catalog.is_valid_transition(ticket_type, from, to)
    }

    /// Apply a stage transition. On success the entry timestamp is stamped,
    /// the ticket persisted under optimistic concurrency, and a stage-entered
    /// event published for the billing engine and SLA monitor.
    pub async fn transition(
        &self,
        ticket_id: &str,
        target: TicketStage,
        actor: &Actor,
        artifacts: &StageArtifacts,
        now: DateTime<Utc>,
    ) -> EngineResult<Ticket> {
        let mut ticket = self.tickets.get(ticket_id)?;

        let needed = if target == TicketStage::Cancelled {
            Permission::CancelTicket
        } else {
            Permission::TransitionStage
        };
        if !is_permitted(actor, needed) {
            return Err(EngineError::Validation(format!(
                "role {} may not perform this transition",
                actor.role
            )));
        }

        if !self
            .catalog
            .is_valid_transition(ticket.ticket_type, ticket.current_stage, target)
        {
            return Err(EngineError::InvalidTransition {
                from: ticket.current_stage.to_string(),
                to: target.to_string(),
            });
        }

        let target_def = self.catalog.definition(ticket.ticket_type, target);
        if let Some(def) = target_def {
            // Cancellation has no definition row and no role/artifact gate.
            check_stage_role(actor, def)?;
            check_artifacts(def, artifacts)?;
        }

        ticket.current_stage = target;
        ticket.stage_entered_at.insert(target, now);
        ticket.updated_at = now;

        let updated = self.tickets.update_with_revision(&ticket)?;
        info!(
            ticket_id = %updated.ticket_id,
            stage = %target,
            actor = %actor.actor_id,
            "ticket stage transition"
        );

        let event = TicketEvent {
            ticket_id: updated.ticket_id.clone(),
            ticket_type: updated.ticket_type,
            job_id: updated.job_id.clone(),
            stage: target,
            entered_at: now,
            actor: actor.actor_id.clone(),
        };
        if let Err(e) = self.events.publish(&event) {
            warn!("event publish failed (ignored): {}", e);
        }

        if let Some(def) = target_def {
            self.notify_stage_entry(&updated, def).await;
        }

        Ok(updated)
    }

    async fn notify_stage_entry(&self, ticket: &Ticket, def: &StageDefinition) {
        let priority = if ticket.urgent {
            NotifyPriority::Urgent
        } else {
            NotifyPriority::Normal
        };
        let message = format!(
            "Ticket {} ({}) entered stage {} for job {}",
            ticket.ticket_id, ticket.ticket_type, def.stage, ticket.job_id
        );
        notify_best_effort(self.notifier.as_ref(), &def.notify_roles, &message, priority).await;
    }
}

/// The actor entering a stage must hold that stage's role (Admin bypasses).
fn check_stage_role(actor: &Actor, def: &StageDefinition) -> EngineResult<()> {
    if actor.role == Role::Admin || actor.role == def.assigned_role {
        return Ok(());
    }
    Err(EngineError::Validation(format!(
        "stage {} is assigned to role {}, actor has role {}",
        def.stage, def.assigned_role, actor.role
    )))
}

fn check_artifacts(def: &StageDefinition, artifacts: &StageArtifacts) -> EngineResult<()> {
    if artifacts.photo_count < def.required_photos {
        return Err(EngineError::MissingArtifact(format!(
            "stage {} requires {} photo(s), got {}",
            def.stage, def.required_photos, artifacts.photo_count
        )));
    }
    if def.requires_gps && artifacts.gps_fix.is_none() {
        return Err(EngineError::MissingArtifact(format!(
            "stage {} requires a GPS fix",
            def.stage
        )));
    }
    if def.requires_signature && artifacts.signature.is_none() {
        return Err(EngineError::MissingArtifact(format!(
            "stage {} requires a signature",
            def.stage
        )));
    }
    Ok(())
}
