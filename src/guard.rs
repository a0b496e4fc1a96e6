use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::delivery::{Delivery, DeliveryStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
    Driver,
}

/// The authenticated principal behind a request. Token issuance and
/// verification happen upstream; the engine only cares about the role and
/// the actor's relationship to the resource.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn admin(id: Uuid) -> Self {
        Self { id, role: Role::Admin }
    }

    pub fn customer(id: Uuid) -> Self {
        Self { id, role: Role::Customer }
    }

    pub fn driver(id: Uuid) -> Self {
        Self { id, role: Role::Driver }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn owns(&self, delivery: &Delivery) -> bool {
        self.role == Role::Customer && delivery.customer_id == self.id
    }

    fn is_assigned_driver(&self, delivery: &Delivery) -> bool {
        self.role == Role::Driver && delivery.driver_id == Some(self.id)
    }
}

/// Single authorization point for status transitions, evaluated by the state
/// machine rather than scattered across call sites.
///
/// Only the assigned driver may drive on-route/picked-up/delivered; only the
/// owning customer or an admin may cancel; `assigned` is reserved for the
/// assignment engine (manual override is guarded there).
pub fn authorize_transition(
    actor: &Actor,
    delivery: &Delivery,
    target: DeliveryStatus,
) -> Result<(), DispatchError> {
    let allowed = match target {
        DeliveryStatus::OnRoute | DeliveryStatus::PickedUp | DeliveryStatus::Delivered => {
            actor.is_assigned_driver(delivery)
        }
        DeliveryStatus::Cancelled => actor.is_admin() || actor.owns(delivery),
        DeliveryStatus::Assigned | DeliveryStatus::Pending => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(DispatchError::Unauthorized(format!(
            "actor {} ({:?}) may not move delivery {} to {}",
            actor.id,
            actor.role,
            delivery.id,
            target.as_str()
        )))
    }
}
