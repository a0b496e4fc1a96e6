use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Driver profile and cumulative counters.
///
/// `is_available` is derived state: it is false exactly while the driver
/// holds a delivery in an active status, and is flipped only by state-machine
/// side effects, never by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub is_available: bool,
    pub total_deliveries: u64,
    pub completed_deliveries: u64,
    pub cancelled_deliveries: u64,
    pub total_earnings: f64,
    pub rating: f64,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_available: true,
            total_deliveries: 0,
            completed_deliveries: 0,
            cancelled_deliveries: 0,
            total_earnings: 0.0,
            rating: 5.0,
            updated_at: Utc::now(),
        }
    }
}
