use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Validates coordinate ranges and rounds both axes to the six
    /// decimal places the store keeps.
    pub fn new(lat: f64, lng: f64) -> Result<Self, AppError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(format!(
                "latitude {lat} out of range [-90, 90]"
            )));
        }

        if !(-180.0..=180.0).contains(&lng) {
            return Err(AppError::Validation(format!(
                "longitude {lng} out of range [-180, 180]"
            )));
        }

        Ok(Self {
            lat: round6(lat),
            lng: round6(lng),
        })
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// A driver's work profile. Keyed by the owning user account (strict 1:1);
/// mutated only through the driver-status operations in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub user_id: Uuid,
    pub online: bool,
    pub busy: bool,
    pub location: Option<GeoPoint>,
    pub vehicle_number: String,
    pub vehicle_model: String,
    pub last_online_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            online: false,
            busy: false,
            location: None,
            vehicle_number: String::new(),
            vehicle_model: String::new(),
            last_online_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn available(&self) -> bool {
        self.online && !self.busy
    }
}
