//! Role-based visibility and modification rules for RFQs and users.

use crate::domain::rfq::Rfq;
use crate::domain::user::{Actor, Role, UserId};
use crate::errors::DomainError;

/// Restriction applied to RFQ listings and statistics for a given actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RfqScope {
    All,
    AssignedEngineer(UserId),
    /// Assigned as sales person, or created by the user.
    SalesOwner(UserId),
}

impl RfqScope {
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            Role::Admin | Role::Management => Self::All,
            Role::Engineer => Self::AssignedEngineer(actor.id.clone()),
            Role::Sales => Self::SalesOwner(actor.id.clone()),
        }
    }

    pub fn includes(&self, rfq: &Rfq) -> bool {
        match self {
            Self::All => true,
            Self::AssignedEngineer(id) => rfq.assigned_engineer_id.as_ref() == Some(id),
            Self::SalesOwner(id) => {
                rfq.assigned_sales_person_id.as_ref() == Some(id)
                    || rfq.created_by.as_ref() == Some(id)
            }
        }
    }
}

pub fn can_view_rfq(actor: &Actor, rfq: &Rfq) -> bool {
    RfqScope::for_actor(actor).includes(rfq)
}

/// Management has read-only access everywhere.
pub fn can_modify_rfq(actor: &Actor, rfq: &Rfq) -> bool {
    actor.role != Role::Management && can_view_rfq(actor, rfq)
}

pub fn ensure_can_view_rfq(actor: &Actor, rfq: &Rfq) -> Result<(), DomainError> {
    if can_view_rfq(actor, rfq) {
        Ok(())
    } else {
        Err(DomainError::Forbidden("access denied to this RFQ".to_string()))
    }
}

pub fn ensure_can_modify_rfq(actor: &Actor, rfq: &Rfq) -> Result<(), DomainError> {
    if can_modify_rfq(actor, rfq) {
        Ok(())
    } else {
        Err(DomainError::Forbidden("not allowed to modify this RFQ".to_string()))
    }
}

pub fn ensure_can_create_rfq(actor: &Actor) -> Result<(), DomainError> {
    match actor.role {
        Role::Admin | Role::Sales => Ok(()),
        Role::Engineer | Role::Management => {
            Err(DomainError::Forbidden("only admin and sales users can create RFQs".to_string()))
        }
    }
}

pub fn ensure_admin(actor: &Actor) -> Result<(), DomainError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(DomainError::Forbidden("admin role required".to_string()))
    }
}

pub fn ensure_can_view_user(actor: &Actor, user_id: &UserId) -> Result<(), DomainError> {
    if actor.is_admin() || &actor.id == user_id {
        Ok(())
    } else {
        Err(DomainError::Forbidden("access denied to this user".to_string()))
    }
}
