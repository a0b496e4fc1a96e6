use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::delivery::{DeliveryStatus, GeoPoint, Location, Payment};
use crate::models::tracking::MovementStatus;
use crate::models::vehicle::VehicleType;

/// Wire schemas are fixed: camelCase field names, one struct per event.

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub delivery_id: Uuid,
    pub location: GeoPoint,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub status: MovementStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub delivery_id: Uuid,
    pub status: DeliveryStatus,
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAssigned {
    pub booking_id: Uuid,
    pub pickup: Location,
    pub drop: Location,
    pub estimated_distance_km: f64,
    pub vehicle_type: Option<VehicleType>,
    pub payment: Payment,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum RoomEvent {
    LocationUpdate(LocationUpdate),
    StatusUpdate(StatusUpdate),
    DriverAssigned(DriverAssigned),
}

impl RoomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocationUpdate(_) => "locationUpdate",
            Self::StatusUpdate(_) => "statusUpdate",
            Self::DriverAssigned(_) => "driverAssigned",
        }
    }
}
