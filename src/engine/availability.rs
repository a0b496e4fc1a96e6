use tracing::debug;
use uuid::Uuid;

use crate::models::driver::Driver;
use crate::models::vehicle::{Vehicle, VehicleStatus};
use crate::models::window::TimeWindow;
use crate::store::{EntityKind, MemoryStore};

/// True iff the entity already holds a delivery in an active status whose
/// window overlaps the candidate window. A `TimeWindow` is valid by
/// construction, so no malformed window can reach this check.
pub fn has_conflict(
    store: &MemoryStore,
    kind: EntityKind,
    entity_id: Uuid,
    window: &TimeWindow,
) -> bool {
    store
        .active_deliveries_for(kind, entity_id)
        .iter()
        .any(|existing| existing.window.overlaps(window))
}

/// Drivers with no overlapping active commitment, in deterministic order
/// (sorted by id, the stable identity tie-break).
pub fn find_available_drivers(store: &MemoryStore, window: &TimeWindow) -> Vec<Driver> {
    let mut drivers = store.drivers();
    drivers.sort_by_key(|driver| driver.id);
    drivers.retain(|driver| !has_conflict(store, EntityKind::Driver, driver.id, window));
    debug!(candidates = drivers.len(), "driver availability scan");
    drivers
}

/// Non-maintenance vehicles with sufficient capacity and no overlapping
/// active commitment, in deterministic order.
pub fn find_available_vehicles(
    store: &MemoryStore,
    window: &TimeWindow,
    required_capacity: f64,
) -> Vec<Vehicle> {
    let mut vehicles = store.vehicles();
    vehicles.sort_by_key(|vehicle| vehicle.id);
    vehicles.retain(|vehicle| {
        vehicle.status != VehicleStatus::Maintenance
            && vehicle.capacity >= required_capacity
            && !has_conflict(store, EntityKind::Vehicle, vehicle.id, window)
    });
    debug!(candidates = vehicles.len(), "vehicle availability scan");
    vehicles
}
