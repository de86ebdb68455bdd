use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Created,
    Assigned,
    Completed,
}

/// A transport order. `driver_id` is set if and only if the status is
/// `Assigned` or `Completed`; the status never moves backwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub client_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub status: OrderStatus,
    pub pickup: GeoPoint,
    pub pickup_address: String,
    pub dropoff: Option<GeoPoint>,
    pub dropoff_address: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
