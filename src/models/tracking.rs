use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    Moving,
    Stopped,
    Idle,
}

/// One timestamped position sample from a vehicle in transit. The stream is
/// append-only: points are never mutated or deleted once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingPoint {
    pub delivery_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub location: GeoPoint,
    /// km/h
    pub speed: Option<f64>,
    /// degrees
    pub heading: Option<f64>,
    pub status: MovementStatus,
    pub timestamp: DateTime<Utc>,
}

/// A raw location report from a driver, prior to ownership validation.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationSample {
    pub delivery_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub location: GeoPoint,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub status: Option<MovementStatus>,
    pub timestamp: DateTime<Utc>,
}
