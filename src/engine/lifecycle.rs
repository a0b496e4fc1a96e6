use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::events::router::EventRouter;
use crate::guard::{authorize_transition, Actor};
use crate::models::delivery::{Delivery, DeliveryStatus, GeoPoint, TrackingUpdate};
use crate::models::vehicle::VehicleStatus;
use crate::observability::metrics::Metrics;
use crate::store::MemoryStore;

/// Fraction of a delivery's payment credited to the driver on completion.
pub const DRIVER_SETTLEMENT_FRACTION: f64 = 0.70;

fn is_legal(from: DeliveryStatus, to: DeliveryStatus) -> bool {
    use DeliveryStatus::*;
    matches!(
        (from, to),
        (Pending, Assigned)
            | (Assigned, OnRoute)
            | (Assigned, PickedUp)
            | (OnRoute, PickedUp)
            | (PickedUp, Delivered)
    ) || (!from.is_terminal() && to == Cancelled)
}

/// The delivery state machine: legal-transition enforcement, authorization,
/// availability side effects, settlement, and the append-only audit trail.
///
/// All mutations to driver and vehicle availability flow through here; no
/// caller touches those fields directly.
pub struct Lifecycle {
    store: Arc<MemoryStore>,
    router: Arc<EventRouter>,
    metrics: Metrics,
    recent_updates_cache: usize,
}

impl Lifecycle {
    pub fn new(
        store: Arc<MemoryStore>,
        router: Arc<EventRouter>,
        metrics: Metrics,
        recent_updates_cache: usize,
    ) -> Self {
        Self {
            store,
            router,
            metrics,
            recent_updates_cache,
        }
    }

    /// Drive a delivery to `target` on behalf of `actor`.
    ///
    /// The status check is re-evaluated inside the store's entry guard, so a
    /// transition that raced with another writer fails with `Conflict`
    /// instead of committing on stale state. Fan-out happens after the
    /// commit and never affects its outcome.
    pub async fn transition(
        &self,
        delivery_id: Uuid,
        target: DeliveryStatus,
        actor: &Actor,
        location: Option<GeoPoint>,
        notes: Option<String>,
    ) -> Result<Delivery, DispatchError> {
        let delivery = self.store.delivery(delivery_id)?;

        // Table first: a request outside the legal table is an invalid
        // transition no matter who asks.
        if !is_legal(delivery.status, target) {
            return Err(invalid_transition(delivery.status, target));
        }
        authorize_transition(actor, &delivery, target)?;

        // Terminal transitions release the driver and the vehicle; hold both
        // entity locks (driver first, then vehicle, same order everywhere)
        // so the release is atomic with the status change.
        let releases = target.is_terminal();
        let _driver_guard = match (releases, delivery.driver_id) {
            (true, Some(driver_id)) => Some(self.store.entity_lock(driver_id).lock_owned().await),
            _ => None,
        };
        let _vehicle_guard = match (releases, delivery.vehicle_id) {
            (true, Some(vehicle_id)) => Some(self.store.entity_lock(vehicle_id).lock_owned().await),
            _ => None,
        };

        let now = Utc::now();
        let update = TrackingUpdate {
            status: target,
            timestamp: now,
            location,
            notes: notes.clone(),
        };

        let cache_size = self.recent_updates_cache;
        let audit_record = update.clone();
        let updated = self.store.update_delivery(delivery_id, move |delivery| {
            if !is_legal(delivery.status, target) {
                return Err(invalid_transition(delivery.status, target));
            }
            delivery.status = target;
            match target {
                DeliveryStatus::PickedUp => {
                    if delivery.actual_pickup_time.is_none() {
                        delivery.actual_pickup_time = Some(now);
                    }
                }
                DeliveryStatus::Delivered => {
                    delivery.actual_delivery_time = Some(now);
                    delivery.delivered_at = Some(now);
                }
                _ => {}
            }
            delivery.push_recent_update(update, cache_size);
            Ok(())
        })?;
        self.store.append_audit(delivery_id, audit_record);

        match target {
            DeliveryStatus::Delivered => self.release(&updated, true)?,
            DeliveryStatus::Cancelled => self.release(&updated, false)?,
            _ => {}
        }

        if delivery.status.is_active() && !updated.status.is_active() {
            self.metrics.active_deliveries.dec();
        }
        self.metrics
            .transitions_total
            .with_label_values(&[target.as_str()])
            .inc();

        info!(
            delivery_id = %delivery_id,
            from = delivery.status.as_str(),
            to = target.as_str(),
            actor = %actor.id,
            "status transition committed"
        );

        self.router.publish_status_change(&updated, notes);
        Ok(updated)
    }

    /// Commit a pending delivery to a driver/vehicle pair.
    ///
    /// Callers (the assignment engine) hold both entity locks and have
    /// re-validated conflicts; the pending check is still re-run inside the
    /// entry guard so a lost race fails cleanly.
    pub(crate) fn commit_assignment(
        &self,
        delivery_id: Uuid,
        driver_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Delivery, DispatchError> {
        let now = Utc::now();
        let update = TrackingUpdate {
            status: DeliveryStatus::Assigned,
            timestamp: now,
            location: None,
            notes: Some("driver and vehicle assigned".to_string()),
        };
        let audit_record = update.clone();

        let cache_size = self.recent_updates_cache;
        let updated = self.store.update_delivery(delivery_id, move |delivery| {
            if delivery.status != DeliveryStatus::Pending {
                return Err(DispatchError::AlreadyAssigned(delivery.id));
            }
            delivery.status = DeliveryStatus::Assigned;
            delivery.driver_id = Some(driver_id);
            delivery.vehicle_id = Some(vehicle_id);
            delivery.assigned_at = Some(now);
            delivery.push_recent_update(update, cache_size);
            Ok(())
        })?;
        self.store.append_audit(delivery_id, audit_record);

        self.store.update_vehicle(vehicle_id, |vehicle| {
            vehicle.status = VehicleStatus::InUse;
            vehicle.assigned_driver = Some(driver_id);
            vehicle.updated_at = now;
            Ok(())
        })?;
        self.store.update_driver(driver_id, |driver| {
            driver.is_available = false;
            driver.total_deliveries += 1;
            driver.updated_at = now;
            Ok(())
        })?;

        self.metrics.active_deliveries.inc();
        self.metrics
            .transitions_total
            .with_label_values(&[DeliveryStatus::Assigned.as_str()])
            .inc();

        self.router.publish_status_change(&updated, None);
        Ok(updated)
    }

    /// Release driver and vehicle when a delivery reaches a terminal state.
    /// `completed` selects the delivered bundle (counter + settlement) over
    /// the cancelled one.
    fn release(&self, delivery: &Delivery, completed: bool) -> Result<(), DispatchError> {
        let now = Utc::now();

        if let Some(vehicle_id) = delivery.vehicle_id {
            let drop_coordinates = delivery.drop_location.coordinates;
            self.store.update_vehicle(vehicle_id, move |vehicle| {
                vehicle.status = VehicleStatus::Available;
                vehicle.current_location = Some(drop_coordinates);
                vehicle.assigned_driver = None;
                vehicle.updated_at = now;
                Ok(())
            })?;
        }

        if let Some(driver_id) = delivery.driver_id {
            let settlement = if completed {
                delivery
                    .payment
                    .amount
                    .map(|amount| amount * DRIVER_SETTLEMENT_FRACTION)
            } else {
                None
            };
            self.store.update_driver(driver_id, move |driver| {
                driver.is_available = true;
                if completed {
                    driver.completed_deliveries += 1;
                } else {
                    driver.cancelled_deliveries += 1;
                }
                if let Some(earning) = settlement {
                    driver.total_earnings += earning;
                }
                driver.updated_at = now;
                Ok(())
            })?;
        }

        Ok(())
    }
}

fn invalid_transition(from: DeliveryStatus, to: DeliveryStatus) -> DispatchError {
    DispatchError::Conflict(format!(
        "invalid transition {} -> {}",
        from.as_str(),
        to.as_str()
    ))
}
