use serde::Serialize;
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;
use crate::store::MemoryStore;

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryStats {
    pub total_deliveries: u64,
    pub pending_deliveries: u64,
    pub completed_deliveries: u64,
    /// Mean actual pickup-to-delivery duration, where both timestamps exist.
    pub avg_delivery_secs: Option<f64>,
}

pub fn delivery_stats(store: &MemoryStore) -> DeliveryStats {
    let deliveries = store.deliveries();

    let mut pending = 0u64;
    let mut completed = 0u64;
    let mut durations = Vec::new();

    for delivery in &deliveries {
        match delivery.status {
            DeliveryStatus::Pending => pending += 1,
            DeliveryStatus::Delivered => completed += 1,
            _ => {}
        }
        if let (Some(picked), Some(delivered)) =
            (delivery.actual_pickup_time, delivery.actual_delivery_time)
        {
            durations.push((delivered - picked).num_milliseconds() as f64 / 1000.0);
        }
    }

    let avg_delivery_secs = if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<f64>() / durations.len() as f64)
    };

    DeliveryStats {
        total_deliveries: deliveries.len() as u64,
        pending_deliveries: pending,
        completed_deliveries: completed,
        avg_delivery_secs,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverPerformance {
    pub driver_id: Uuid,
    pub driver_name: String,
    pub delivered: u64,
    pub avg_delivery_secs: Option<f64>,
}

/// Per-driver delivered counts and mean delivery duration, sorted by driver
/// id for stable output.
pub fn driver_stats(store: &MemoryStore) -> Vec<DriverPerformance> {
    let mut drivers = store.drivers();
    drivers.sort_by_key(|driver| driver.id);

    let deliveries = store.deliveries();

    drivers
        .into_iter()
        .map(|driver| {
            let mut delivered = 0u64;
            let mut durations = Vec::new();
            for delivery in &deliveries {
                if delivery.driver_id != Some(driver.id)
                    || delivery.status != DeliveryStatus::Delivered
                {
                    continue;
                }
                delivered += 1;
                if let (Some(picked), Some(done)) =
                    (delivery.actual_pickup_time, delivery.actual_delivery_time)
                {
                    durations.push((done - picked).num_milliseconds() as f64 / 1000.0);
                }
            }
            let avg_delivery_secs = if durations.is_empty() {
                None
            } else {
                Some(durations.iter().sum::<f64>() / durations.len() as f64)
            };
            DriverPerformance {
                driver_id: driver.id,
                driver_name: driver.name,
                delivered,
                avg_delivery_secs,
            }
        })
        .collect()
}
