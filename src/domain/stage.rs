// ==========================================
// Roofline Ops - stage catalog
// ==========================================
// Static stage definitions per ticket type: ordering, assigned role,
// required artifacts, duration limits, roles to notify on entry.
// Pure data, loaded once at startup, no behavior beyond lookups.
// ==========================================

use crate::domain::types::{Role, TicketStage, TicketType};
use chrono::Duration;
use std::collections::HashMap;

// ==========================================
// Stage definition
// ==========================================
#[derive(Debug, Clone)]
pub struct StageDefinition {
    pub stage: TicketStage,
    pub ticket_type: TicketType,
    /// Role expected to perform the work that enters this stage.
    pub assigned_role: Role,
    pub required_photos: u32,
    pub requires_gps: bool,
    pub requires_signature: bool,
    /// Dwell time before an SLA warning is raised.
    pub estimated_minutes: i64,
    /// Dwell time before an SLA violation is raised.
    pub max_minutes: i64,
    pub predecessors: Vec<TicketStage>,
    pub successors: Vec<TicketStage>,
    pub notify_roles: Vec<Role>,
}

// ==========================================
// Stage catalog
// ==========================================
pub struct StageCatalog {
    definitions: HashMap<(TicketType, TicketStage), StageDefinition>,
    first_stages: HashMap<TicketType, TicketStage>,
}

impl StageCatalog {
    /// Built-in stage tables.
    ///
    /// Delivery: Created → MaterialsPulled → Loaded → InTransit → Delivered → Completed
    /// Pickup:   Created → InTransit → PickedUp → ReturnedToYard → Completed
    /// Return:   Created → InTransit → PickedUp → ReturnedToYard → Verified → Completed
    ///
    /// Any non-terminal stage may additionally transition to Cancelled.
    pub fn builtin() -> Self {
        use Role::*;
        use TicketStage::*;
        use TicketType::*;

        let mut catalog = Self {
            definitions: HashMap::new(),
            first_stages: HashMap::new(),
        };

        // ---- Delivery ----
        catalog.add(StageDefinition {
            stage: Created,
            ticket_type: Delivery,
            assigned_role: Dispatcher,
            required_photos: 0,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 2 * 60,
            max_minutes: 8 * 60,
            predecessors: vec![],
            successors: vec![MaterialsPulled],
            notify_roles: vec![Warehouse],
        });
        catalog.add(StageDefinition {
            stage: MaterialsPulled,
            ticket_type: Delivery,
            assigned_role: Warehouse,
            required_photos: 1,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 4 * 60,
            max_minutes: 24 * 60,
            predecessors: vec![Created],
            successors: vec![Loaded],
            notify_roles: vec![Driver],
        });
        catalog.add(StageDefinition {
            stage: Loaded,
            ticket_type: Delivery,
            assigned_role: Driver,
            required_photos: 1,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 60,
            max_minutes: 4 * 60,
            predecessors: vec![MaterialsPulled],
            successors: vec![InTransit],
            notify_roles: vec![Dispatcher],
        });
        catalog.add(StageDefinition {
            stage: InTransit,
            ticket_type: Delivery,
            assigned_role: Driver,
            required_photos: 0,
            requires_gps: true,
            requires_signature: false,
            estimated_minutes: 90,
            max_minutes: 8 * 60,
            predecessors: vec![Loaded],
            successors: vec![Delivered],
            notify_roles: vec![Dispatcher],
        });
        catalog.add(StageDefinition {
            stage: Delivered,
            ticket_type: Delivery,
            assigned_role: Driver,
            required_photos: 1,
            requires_gps: true,
            requires_signature: true,
            estimated_minutes: 4 * 60,
            max_minutes: 24 * 60,
            predecessors: vec![InTransit],
            successors: vec![Completed],
            notify_roles: vec![Billing, Dispatcher],
        });
        catalog.add(StageDefinition {
            stage: Completed,
            ticket_type: Delivery,
            assigned_role: Dispatcher,
            required_photos: 0,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 0,
            max_minutes: 0,
            predecessors: vec![Delivered],
            successors: vec![],
            notify_roles: vec![],
        });

        // ---- Pickup ----
        catalog.add(StageDefinition {
            stage: Created,
            ticket_type: Pickup,
            assigned_role: Dispatcher,
            required_photos: 0,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 4 * 60,
            max_minutes: 24 * 60,
            predecessors: vec![],
            successors: vec![InTransit],
            notify_roles: vec![Driver],
        });
        catalog.add(StageDefinition {
            stage: InTransit,
            ticket_type: Pickup,
            assigned_role: Driver,
            required_photos: 0,
            requires_gps: true,
            requires_signature: false,
            estimated_minutes: 90,
            max_minutes: 8 * 60,
            predecessors: vec![Created],
            successors: vec![PickedUp],
            notify_roles: vec![Dispatcher],
        });
        catalog.add(StageDefinition {
            stage: PickedUp,
            ticket_type: Pickup,
            assigned_role: Driver,
            required_photos: 1,
            requires_gps: true,
            requires_signature: false,
            estimated_minutes: 60,
            max_minutes: 4 * 60,
            predecessors: vec![InTransit],
            successors: vec![ReturnedToYard],
            notify_roles: vec![Warehouse],
        });
        catalog.add(StageDefinition {
            stage: ReturnedToYard,
            ticket_type: Pickup,
            assigned_role: Warehouse,
            required_photos: 0,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 4 * 60,
            max_minutes: 24 * 60,
            predecessors: vec![PickedUp],
            successors: vec![Completed],
            notify_roles: vec![Dispatcher],
        });
        catalog.add(StageDefinition {
            stage: Completed,
            ticket_type: Pickup,
            assigned_role: Dispatcher,
            required_photos: 0,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 0,
            max_minutes: 0,
            predecessors: vec![ReturnedToYard],
            successors: vec![],
            notify_roles: vec![],
        });

        // ---- Return ----
        catalog.add(StageDefinition {
            stage: Created,
            ticket_type: Return,
            assigned_role: Dispatcher,
            required_photos: 0,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 4 * 60,
            max_minutes: 24 * 60,
            predecessors: vec![],
            successors: vec![InTransit],
            notify_roles: vec![Driver],
        });
        catalog.add(StageDefinition {
            stage: InTransit,
            ticket_type: Return,
            assigned_role: Driver,
            required_photos: 0,
            requires_gps: true,
            requires_signature: false,
            estimated_minutes: 90,
            max_minutes: 8 * 60,
            predecessors: vec![Created],
            successors: vec![PickedUp],
            notify_roles: vec![Dispatcher],
        });
        catalog.add(StageDefinition {
            stage: PickedUp,
            ticket_type: Return,
            assigned_role: Driver,
            required_photos: 1,
            requires_gps: true,
            requires_signature: false,
            estimated_minutes: 60,
            max_minutes: 4 * 60,
            predecessors: vec![InTransit],
            successors: vec![ReturnedToYard],
            notify_roles: vec![Warehouse],
        });
        catalog.add(StageDefinition {
            stage: ReturnedToYard,
            ticket_type: Return,
            assigned_role: Warehouse,
            required_photos: 0,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 4 * 60,
            max_minutes: 24 * 60,
            predecessors: vec![PickedUp],
            successors: vec![Verified],
            notify_roles: vec![Warehouse],
        });
        catalog.add(StageDefinition {
            stage: Verified,
            ticket_type: Return,
            assigned_role: Warehouse,
            required_photos: 1,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 8 * 60,
            max_minutes: 48 * 60,
            predecessors: vec![ReturnedToYard],
            successors: vec![Completed],
            notify_roles: vec![Billing],
        });
        catalog.add(StageDefinition {
            stage: Completed,
            ticket_type: Return,
            assigned_role: Dispatcher,
            required_photos: 0,
            requires_gps: false,
            requires_signature: false,
            estimated_minutes: 0,
            max_minutes: 0,
            predecessors: vec![Verified],
            successors: vec![],
            notify_roles: vec![],
        });

        catalog.first_stages.insert(Delivery, Created);
        catalog.first_stages.insert(Pickup, Created);
        catalog.first_stages.insert(Return, Created);

        catalog
    }

    fn add(&mut self, def: StageDefinition) {
        self.definitions.insert((def.ticket_type, def.stage), def);
    }

    pub fn definition(&self, ticket_type: TicketType, stage: TicketStage) -> Option<&StageDefinition> {
        self.definitions.get(&(ticket_type, stage))
    }

    pub fn first_stage(&self, ticket_type: TicketType) -> TicketStage {
        // All built-in flows start at Created.
        self.first_stages
            .get(&ticket_type)
            .copied()
            .unwrap_or(TicketStage::Created)
    }

    /// True iff `to` is a declared successor of `from` for this ticket type,
    /// or `to` is Cancelled and `from` is not terminal.
    pub fn is_valid_transition(
        &self,
        ticket_type: TicketType,
        from: TicketStage,
        to: TicketStage,
    ) -> bool {
        if from.is_terminal() {
            return false;
        }
        if to == TicketStage::Cancelled {
            return true;
        }
        self.definition(ticket_type, from)
            .map(|def| def.successors.contains(&to))
            .unwrap_or(false)
    }

    /// SLA warning threshold for dwell time in a stage.
    pub fn warning_limit(&self, ticket_type: TicketType, stage: TicketStage) -> Option<Duration> {
        self.definition(ticket_type, stage)
            .filter(|d| d.estimated_minutes > 0)
            .map(|d| Duration::minutes(d.estimated_minutes))
    }

    /// SLA violation threshold for dwell time in a stage.
    pub fn violation_limit(&self, ticket_type: TicketType, stage: TicketStage) -> Option<Duration> {
        self.definition(ticket_type, stage)
            .filter(|d| d.max_minutes > 0)
            .map(|d| Duration::minutes(d.max_minutes))
    }
}
