use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Truck,
    Van,
    Bike,
    Car,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truck => "truck",
            Self::Van => "van",
            Self::Bike => "bike",
            Self::Car => "car",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleStatus {
    Available,
    InUse,
    Maintenance,
}

/// A vehicle is `in-use` exactly while it is attached to an active delivery;
/// the flag is mutated only by state-machine side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub vehicle_number: String,
    pub vehicle_type: VehicleType,
    /// Kilograms.
    pub capacity: f64,
    pub status: VehicleStatus,
    pub current_location: Option<GeoPoint>,
    pub assigned_driver: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(vehicle_number: impl Into<String>, vehicle_type: VehicleType, capacity: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            vehicle_number: vehicle_number.into(),
            vehicle_type,
            capacity,
            status: VehicleStatus::Available,
            current_location: None,
            assigned_driver: None,
            updated_at: Utc::now(),
        }
    }
}
