use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::delivery::{Delivery, TrackingUpdate};
use crate::models::driver::Driver;
use crate::models::tracking::TrackingPoint;
use crate::models::vehicle::Vehicle;

/// Which side of a schedule an entity occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Driver,
    Vehicle,
}

/// In-memory durable-store collaborator.
///
/// Entities are updated through closure-based conditional updates that
/// clone, mutate, and write back under the map entry guard, so a failed
/// update never leaves a partial mutation behind. Deliveries are never
/// deleted; cancelled deliveries remain as historical records. The audit
/// and tracking streams are append-only.
pub struct MemoryStore {
    deliveries: DashMap<Uuid, Delivery>,
    drivers: DashMap<Uuid, Driver>,
    vehicles: DashMap<Uuid, Vehicle>,
    audit: DashMap<Uuid, Vec<TrackingUpdate>>,
    tracking: DashMap<Uuid, Vec<TrackingPoint>>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            deliveries: DashMap::new(),
            drivers: DashMap::new(),
            vehicles: DashMap::new(),
            audit: DashMap::new(),
            tracking: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Serialization point for all writes touching one entity. Callers must
    /// acquire locks in a fixed order (driver before vehicle) when holding
    /// more than one.
    pub fn entity_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn insert_delivery(&self, delivery: Delivery) -> Delivery {
        self.deliveries.insert(delivery.id, delivery.clone());
        delivery
    }

    pub fn insert_driver(&self, driver: Driver) -> Driver {
        self.drivers.insert(driver.id, driver.clone());
        driver
    }

    pub fn insert_vehicle(&self, vehicle: Vehicle) -> Vehicle {
        self.vehicles.insert(vehicle.id, vehicle.clone());
        vehicle
    }

    pub fn delivery(&self, id: Uuid) -> Result<Delivery, DispatchError> {
        self.deliveries
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::not_found("delivery", id))
    }

    pub fn driver(&self, id: Uuid) -> Result<Driver, DispatchError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::not_found("driver", id))
    }

    pub fn vehicle(&self, id: Uuid) -> Result<Vehicle, DispatchError> {
        self.vehicles
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DispatchError::not_found("vehicle", id))
    }

    pub fn update_delivery<F>(&self, id: Uuid, f: F) -> Result<Delivery, DispatchError>
    where
        F: FnOnce(&mut Delivery) -> Result<(), DispatchError>,
    {
        let mut entry = self
            .deliveries
            .get_mut(&id)
            .ok_or_else(|| DispatchError::not_found("delivery", id))?;
        let mut candidate = entry.value().clone();
        f(&mut candidate)?;
        *entry.value_mut() = candidate.clone();
        Ok(candidate)
    }

    pub fn update_driver<F>(&self, id: Uuid, f: F) -> Result<Driver, DispatchError>
    where
        F: FnOnce(&mut Driver) -> Result<(), DispatchError>,
    {
        let mut entry = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| DispatchError::not_found("driver", id))?;
        let mut candidate = entry.value().clone();
        f(&mut candidate)?;
        *entry.value_mut() = candidate.clone();
        Ok(candidate)
    }

    pub fn update_vehicle<F>(&self, id: Uuid, f: F) -> Result<Vehicle, DispatchError>
    where
        F: FnOnce(&mut Vehicle) -> Result<(), DispatchError>,
    {
        let mut entry = self
            .vehicles
            .get_mut(&id)
            .ok_or_else(|| DispatchError::not_found("vehicle", id))?;
        let mut candidate = entry.value().clone();
        f(&mut candidate)?;
        *entry.value_mut() = candidate.clone();
        Ok(candidate)
    }

    /// Deliveries in an active status (assigned/on-route/picked-up) held by
    /// the given driver or vehicle.
    pub fn active_deliveries_for(&self, kind: EntityKind, entity_id: Uuid) -> Vec<Delivery> {
        self.deliveries
            .iter()
            .filter(|entry| {
                let delivery = entry.value();
                let holds = match kind {
                    EntityKind::Driver => delivery.driver_id == Some(entity_id),
                    EntityKind::Vehicle => delivery.vehicle_id == Some(entity_id),
                };
                holds && delivery.status.is_active()
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn drivers(&self) -> Vec<Driver> {
        self.drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.vehicles
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn append_audit(&self, delivery_id: Uuid, update: TrackingUpdate) {
        self.audit.entry(delivery_id).or_default().push(update);
    }

    /// The full, never-truncated audit trail in append order.
    pub fn audit_trail(&self, delivery_id: Uuid) -> Vec<TrackingUpdate> {
        self.audit
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn append_tracking_point(&self, point: TrackingPoint) {
        self.tracking.entry(point.delivery_id).or_default().push(point);
    }

    pub fn last_tracking_timestamp(
        &self,
        delivery_id: Uuid,
    ) -> Option<chrono::DateTime<chrono::Utc>> {
        self.tracking
            .get(&delivery_id)
            .and_then(|entry| entry.value().last().map(|point| point.timestamp))
    }

    /// The most recent tracking points, newest first.
    pub fn recent_tracking(&self, delivery_id: Uuid, limit: usize) -> Vec<TrackingPoint> {
        let Some(entry) = self.tracking.get(&delivery_id) else {
            return Vec::new();
        };
        entry
            .value()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
