use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::events::payloads::{DriverAssigned, LocationUpdate, RoomEvent, StatusUpdate};
use crate::events::transport::Transport;
use crate::models::delivery::{Delivery, DeliveryStatus, TrackingUpdate};
use crate::models::tracking::{LocationSample, MovementStatus, TrackingPoint};
use crate::observability::metrics::Metrics;
use crate::store::MemoryStore;

pub fn delivery_room(id: Uuid) -> String {
    format!("delivery:{id}")
}

pub fn customer_room(id: Uuid) -> String {
    format!("customer:{id}")
}

pub fn driver_room(id: Uuid) -> String {
    format!("driver:{id}")
}

pub const ADMIN_ROOM: &str = "admin";
pub const DRIVERS_ROOM: &str = "drivers";

/// Room-based fan-out of state and location changes.
///
/// The router is constructed with its transport handle; there is no global
/// accessor and no uninitialized state to hit at runtime. Fan-out is
/// decoupled from state commits: emission failures never roll anything back.
pub struct EventRouter {
    store: Arc<MemoryStore>,
    transport: Arc<dyn Transport>,
    metrics: Metrics,
    recent_updates_cache: usize,
}

impl EventRouter {
    pub fn new(
        store: Arc<MemoryStore>,
        transport: Arc<dyn Transport>,
        metrics: Metrics,
        recent_updates_cache: usize,
    ) -> Self {
        Self {
            store,
            transport,
            metrics,
            recent_updates_cache,
        }
    }

    pub fn join_room(&self, client_id: Uuid, room: &str) {
        self.transport.join_room(client_id, room);
    }

    fn emit(&self, room: &str, event: RoomEvent) {
        self.metrics
            .room_events_total
            .with_label_values(&[event.name()])
            .inc();
        self.transport.emit(room, event);
    }

    /// Accept one location sample from a driver in transit.
    ///
    /// The reporting driver must be the delivery's assigned driver and the
    /// vehicle must match. Stale samples (not newer than the last stored
    /// point) are dropped without error: telemetry is advisory, duplicates
    /// and reordering carry no correctness weight. Returns the stored point,
    /// or `None` when the sample was dropped.
    pub async fn ingest_location(
        &self,
        sample: LocationSample,
    ) -> Result<Option<TrackingPoint>, DispatchError> {
        let delivery = self.store.delivery(sample.delivery_id)?;

        if delivery.driver_id != Some(sample.driver_id)
            || delivery.vehicle_id != Some(sample.vehicle_id)
        {
            return Err(DispatchError::Unauthorized(format!(
                "driver {} does not hold delivery {} with vehicle {}",
                sample.driver_id, sample.delivery_id, sample.vehicle_id
            )));
        }

        if let Some(last) = self.store.last_tracking_timestamp(sample.delivery_id) {
            if sample.timestamp <= last {
                debug!(
                    delivery_id = %sample.delivery_id,
                    "dropping stale location sample"
                );
                return Ok(None);
            }
        }

        let point = TrackingPoint {
            delivery_id: sample.delivery_id,
            driver_id: sample.driver_id,
            vehicle_id: sample.vehicle_id,
            location: sample.location,
            speed: sample.speed,
            heading: sample.heading,
            status: sample.status.unwrap_or(MovementStatus::Moving),
            timestamp: sample.timestamp,
        };
        self.store.append_tracking_point(point.clone());
        self.metrics.tracking_points_total.inc();

        {
            let vehicle_lock = self.store.entity_lock(sample.vehicle_id);
            let _guard = vehicle_lock.lock().await;
            self.store.update_vehicle(sample.vehicle_id, |vehicle| {
                vehicle.current_location = Some(sample.location);
                vehicle.updated_at = Utc::now();
                Ok(())
            })?;
        }

        let update = TrackingUpdate {
            status: DeliveryStatus::OnRoute,
            timestamp: point.timestamp,
            location: Some(point.location),
            notes: Some(format!(
                "location update: {}, {}",
                point.location.lat, point.location.lng
            )),
        };
        self.store.append_audit(sample.delivery_id, update.clone());
        let cache_size = self.recent_updates_cache;
        self.store.update_delivery(sample.delivery_id, |delivery| {
            delivery.push_recent_update(update.clone(), cache_size);
            Ok(())
        })?;

        let payload = LocationUpdate {
            delivery_id: point.delivery_id,
            location: point.location,
            speed: point.speed,
            heading: point.heading,
            status: point.status,
            timestamp: point.timestamp,
        };
        self.emit(
            &delivery_room(point.delivery_id),
            RoomEvent::LocationUpdate(payload.clone()),
        );
        self.emit(ADMIN_ROOM, RoomEvent::LocationUpdate(payload));

        Ok(Some(point))
    }

    /// Fan out a committed status change. Invoked by the state machine after
    /// every commit; the `assigned` transition additionally notifies the new
    /// driver and the global drivers room.
    pub fn publish_status_change(&self, delivery: &Delivery, notes: Option<String>) {
        let timestamp = Utc::now();
        let status_update = StatusUpdate {
            delivery_id: delivery.id,
            status: delivery.status,
            notes,
            timestamp,
        };

        self.emit(
            &delivery_room(delivery.id),
            RoomEvent::StatusUpdate(status_update.clone()),
        );
        self.emit(
            &customer_room(delivery.customer_id),
            RoomEvent::StatusUpdate(status_update.clone()),
        );
        self.emit(ADMIN_ROOM, RoomEvent::StatusUpdate(status_update));

        if delivery.status == DeliveryStatus::Assigned {
            let vehicle_type = delivery
                .vehicle_id
                .and_then(|id| self.store.vehicle(id).ok())
                .map(|vehicle| vehicle.vehicle_type);
            let payload = DriverAssigned {
                booking_id: delivery.id,
                pickup: delivery.pickup_location.clone(),
                drop: delivery.drop_location.clone(),
                estimated_distance_km: delivery.estimated_distance_km,
                vehicle_type,
                payment: delivery.payment.clone(),
                timestamp,
            };

            if let Some(driver_id) = delivery.driver_id {
                self.emit(
                    &driver_room(driver_id),
                    RoomEvent::DriverAssigned(payload.clone()),
                );
            }
            self.emit(DRIVERS_ROOM, RoomEvent::DriverAssigned(payload));
        }

        info!(
            delivery_id = %delivery.id,
            status = delivery.status.as_str(),
            "status change published"
        );
    }
}
