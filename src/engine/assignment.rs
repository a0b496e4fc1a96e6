use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::availability::{find_available_drivers, find_available_vehicles, has_conflict};
use crate::engine::lifecycle::Lifecycle;
use crate::error::DispatchError;
use crate::guard::Actor;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::vehicle::VehicleStatus;
use crate::models::window::TimeWindow;
use crate::observability::metrics::Metrics;
use crate::store::{EntityKind, MemoryStore};

/// Selects and commits a driver/vehicle pair to a pending delivery.
///
/// Candidate selection is advisory; the authoritative no-conflict check runs
/// again inside the per-entity critical section, so a caller-supplied or
/// previously computed candidate set is never trusted at commit time.
pub struct AssignmentEngine {
    store: Arc<MemoryStore>,
    lifecycle: Arc<Lifecycle>,
    metrics: Metrics,
}

impl AssignmentEngine {
    pub fn new(store: Arc<MemoryStore>, lifecycle: Arc<Lifecycle>, metrics: Metrics) -> Self {
        Self {
            store,
            lifecycle,
            metrics,
        }
    }

    /// Assign the first conflict-free driver and the first conflict-free,
    /// capacity-sufficient vehicle to a pending delivery.
    pub async fn auto_assign(&self, delivery_id: Uuid) -> Result<Delivery, DispatchError> {
        let start = Instant::now();
        let result = self.auto_assign_inner(delivery_id).await;
        self.record(&result, start);
        result
    }

    async fn auto_assign_inner(&self, delivery_id: Uuid) -> Result<Delivery, DispatchError> {
        let delivery = self.store.delivery(delivery_id)?;
        if delivery.status != DeliveryStatus::Pending {
            return Err(DispatchError::AlreadyAssigned(delivery_id));
        }

        let drivers = find_available_drivers(&self.store, &delivery.window);
        let driver = drivers.first().ok_or(DispatchError::NoAvailableDriver)?;

        let vehicles = find_available_vehicles(
            &self.store,
            &delivery.window,
            delivery.required_capacity(),
        );
        let vehicle = vehicles.first().ok_or(DispatchError::NoAvailableVehicle)?;

        self.commit(delivery_id, &delivery.window, driver.id, vehicle.id)
            .await
    }

    /// Administrator override for a specific driver/vehicle pair.
    pub async fn manual_assign(
        &self,
        delivery_id: Uuid,
        driver_id: Uuid,
        vehicle_id: Uuid,
        actor: &Actor,
    ) -> Result<Delivery, DispatchError> {
        let start = Instant::now();
        let result = self
            .manual_assign_inner(delivery_id, driver_id, vehicle_id, actor)
            .await;
        self.record(&result, start);
        result
    }

    async fn manual_assign_inner(
        &self,
        delivery_id: Uuid,
        driver_id: Uuid,
        vehicle_id: Uuid,
        actor: &Actor,
    ) -> Result<Delivery, DispatchError> {
        if !actor.is_admin() {
            return Err(DispatchError::Unauthorized(
                "manual assignment requires an administrator".to_string(),
            ));
        }

        let delivery = self.store.delivery(delivery_id)?;
        if delivery.status != DeliveryStatus::Pending {
            return Err(DispatchError::AlreadyAssigned(delivery_id));
        }

        self.store.driver(driver_id)?;
        let vehicle = self.store.vehicle(vehicle_id)?;
        if vehicle.status == VehicleStatus::Maintenance {
            return Err(DispatchError::Conflict(format!(
                "vehicle {vehicle_id} is under maintenance"
            )));
        }

        self.commit(delivery_id, &delivery.window, driver_id, vehicle_id)
            .await
    }

    /// The serialized commit: both entity locks held (driver first, then
    /// vehicle — the fixed order used everywhere), conflicts re-validated
    /// inside, then the pending->assigned write through the state machine.
    /// Two concurrent requests over the same driver or vehicle for
    /// overlapping windows cannot both pass the re-check.
    async fn commit(
        &self,
        delivery_id: Uuid,
        window: &TimeWindow,
        driver_id: Uuid,
        vehicle_id: Uuid,
    ) -> Result<Delivery, DispatchError> {
        let driver_lock = self.store.entity_lock(driver_id);
        let vehicle_lock = self.store.entity_lock(vehicle_id);
        let _driver_guard = driver_lock.lock().await;
        let _vehicle_guard = vehicle_lock.lock().await;

        if has_conflict(&self.store, EntityKind::Driver, driver_id, window) {
            warn!(delivery_id = %delivery_id, driver_id = %driver_id, "driver conflict at commit");
            return Err(DispatchError::Conflict(format!(
                "driver {driver_id} has a scheduling conflict"
            )));
        }
        if has_conflict(&self.store, EntityKind::Vehicle, vehicle_id, window) {
            warn!(delivery_id = %delivery_id, vehicle_id = %vehicle_id, "vehicle conflict at commit");
            return Err(DispatchError::Conflict(format!(
                "vehicle {vehicle_id} has a scheduling conflict"
            )));
        }

        let delivery = self
            .lifecycle
            .commit_assignment(delivery_id, driver_id, vehicle_id)?;

        info!(
            delivery_id = %delivery_id,
            driver_id = %driver_id,
            vehicle_id = %vehicle_id,
            "delivery assigned"
        );

        Ok(delivery)
    }

    fn record(&self, result: &Result<Delivery, DispatchError>, start: Instant) {
        let outcome = if result.is_ok() { "success" } else { "error" };
        let elapsed = start.elapsed().as_secs_f64();
        self.metrics
            .assignment_latency_seconds
            .with_label_values(&[outcome])
            .observe(elapsed);
        self.metrics
            .assignments_total
            .with_label_values(&[outcome])
            .inc();
    }
}
