use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::window::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A pickup or drop location: street address plus coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub coordinates: GeoPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    OnRoute,
    PickedUp,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    /// Statuses that occupy the driver's and the vehicle's schedule.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Assigned | Self::OnRoute | Self::PickedUp)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::OnRoute => "on-route",
            Self::PickedUp => "picked-up",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Option<f64>,
    pub method: Option<String>,
    pub status: PaymentStatus,
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            amount: None,
            method: None,
            status: PaymentStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageDetails {
    pub description: Option<String>,
    /// Kilograms; doubles as the required vehicle capacity.
    pub weight: Option<f64>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// One immutable audit record. The full trail lives in the store's
/// append-only stream; the delivery record carries a bounded cache of the
/// most recent entries for fast reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub pickup_location: Location,
    pub drop_location: Location,
    pub status: DeliveryStatus,
    pub window: TimeWindow,
    pub actual_pickup_time: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub package_details: PackageDetails,
    pub estimated_distance_km: f64,
    pub payment: Payment,
    /// Bounded recent-updates cache, newest at the back.
    pub recent_updates: VecDeque<TrackingUpdate>,
    pub created_at: DateTime<Utc>,
}

impl Delivery {
    pub fn new(
        customer_id: Uuid,
        pickup_location: Location,
        drop_location: Location,
        window: TimeWindow,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            driver_id: None,
            vehicle_id: None,
            pickup_location,
            drop_location,
            status: DeliveryStatus::Pending,
            window,
            actual_pickup_time: None,
            actual_delivery_time: None,
            assigned_at: None,
            delivered_at: None,
            package_details: PackageDetails::default(),
            estimated_distance_km: 0.0,
            payment: Payment::default(),
            recent_updates: VecDeque::new(),
            created_at: Utc::now(),
        }
    }

    pub fn required_capacity(&self) -> f64 {
        self.package_details.weight.unwrap_or(0.0)
    }

    pub fn push_recent_update(&mut self, update: TrackingUpdate, cache_size: usize) {
        if self.recent_updates.len() >= cache_size {
            self.recent_updates.pop_front();
        }
        self.recent_updates.push_back(update);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{Delivery, DeliveryStatus, GeoPoint, Location, TrackingUpdate};
    use crate::models::window::TimeWindow;

    #[test]
    fn recent_updates_cache_evicts_oldest_first() {
        let start = Utc::now();
        let window = TimeWindow::new(start, start + Duration::hours(1)).unwrap();
        let location = Location {
            address: "depot".to_string(),
            coordinates: GeoPoint { lat: 0.0, lng: 0.0 },
        };
        let mut delivery = Delivery::new(Uuid::new_v4(), location.clone(), location, window);

        for i in 0..5 {
            delivery.push_recent_update(
                TrackingUpdate {
                    status: DeliveryStatus::OnRoute,
                    timestamp: start + Duration::minutes(i),
                    location: None,
                    notes: Some(format!("update {i}")),
                },
                3,
            );
        }

        assert_eq!(delivery.recent_updates.len(), 3);
        assert_eq!(
            delivery.recent_updates.front().unwrap().notes.as_deref(),
            Some("update 2")
        );
        assert_eq!(
            delivery.recent_updates.back().unwrap().notes.as_deref(),
            Some("update 4")
        );
    }
}
