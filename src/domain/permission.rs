// ==========================================
// Roofline Ops - permission policy
// ==========================================
// Single policy point for all role checks. Both the engines and the API
// boundary go through is_permitted(); no ad-hoc role string comparisons
// anywhere else.
// ==========================================

use crate::domain::types::Role;
use serde::{Deserialize, Serialize};

// ==========================================
// Actor
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub actor_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(actor_id: &str, role: Role) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            role,
        }
    }
}

// ==========================================
// Permission
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    SubmitOrder,
    TransitionStage,
    CancelTicket,
    CreateBilling,
    UpdateBillingStatus,
    ApproveBilling,
    ResolveAlert,
    RunBatchJobs,
    ManageConfig,
}

impl Role {
    /// Permission set per role. Admin holds everything.
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Admin => &[
                SubmitOrder,
                TransitionStage,
                CancelTicket,
                CreateBilling,
                UpdateBillingStatus,
                ApproveBilling,
                ResolveAlert,
                RunBatchJobs,
                ManageConfig,
            ],
            Role::Dispatcher => &[SubmitOrder, TransitionStage, CancelTicket, ResolveAlert],
            Role::Warehouse => &[TransitionStage],
            Role::Driver => &[TransitionStage],
            Role::Billing => &[
                CreateBilling,
                UpdateBillingStatus,
                ApproveBilling,
                ResolveAlert,
                RunBatchJobs,
            ],
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

/// Policy check used by engines and the API boundary alike.
pub fn is_permitted(actor: &Actor, permission: Permission) -> bool {
    actor.role.has_permission(permission)
}
