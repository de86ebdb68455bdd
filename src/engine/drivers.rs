use chrono::Utc;
use tracing::info;

use crate::engine::availability;
use crate::error::AppError;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::user::{User, UserRole};
use crate::state::AppState;

/// Explicit upsert: a driver profile is created the first time any
/// status-affecting operation touches it, keyed by the owning user.
/// Idempotent; re-invocation returns the existing profile untouched.
pub async fn get_or_create(state: &AppState, user: &User) -> Result<Driver, AppError> {
    let _txn = state.store.begin().await;
    upsert_locked(state, user)
}

/// Marks the driver online and available for assignment. Idempotent;
/// `last_online_at` is re-stamped on every call.
pub async fn set_online(state: &AppState, user: &User) -> Result<Driver, AppError> {
    let driver = {
        let _txn = state.store.begin().await;
        let mut driver = upsert_locked(state, user)?;
        let now = Utc::now();
        driver.online = true;
        driver.last_online_at = Some(now);
        driver.updated_at = now;
        state.store.put_driver(driver.clone());
        state.index.invalidate();
        driver
    };

    info!(driver_id = %driver.user_id, "driver online");
    availability::publish_available(state);
    Ok(driver)
}

/// Marks the driver offline. Busy flag and last known location are kept.
pub async fn set_offline(state: &AppState, user: &User) -> Result<Driver, AppError> {
    let driver = {
        let _txn = state.store.begin().await;
        let mut driver = upsert_locked(state, user)?;
        driver.online = false;
        driver.updated_at = Utc::now();
        state.store.put_driver(driver.clone());
        state.index.invalidate();
        driver
    };

    info!(driver_id = %driver.user_id, "driver offline");
    availability::publish_available(state);
    Ok(driver)
}

pub async fn update_location(
    state: &AppState,
    user: &User,
    lat: f64,
    lng: f64,
) -> Result<Driver, AppError> {
    let location = GeoPoint::new(lat, lng)?;

    let driver = {
        let _txn = state.store.begin().await;
        let mut driver = upsert_locked(state, user)?;
        driver.location = Some(location);
        driver.updated_at = Utc::now();
        state.store.put_driver(driver.clone());
        state.index.invalidate();
        driver
    };

    availability::publish_available(state);
    Ok(driver)
}

/// Sets the busy flag. Only flipping to busy invalidates the index; a
/// freed driver reappears once the cached set expires.
pub async fn set_busy(state: &AppState, user: &User, busy: bool) -> Result<Driver, AppError> {
    let driver = {
        let _txn = state.store.begin().await;
        let mut driver = upsert_locked(state, user)?;
        driver.busy = busy;
        driver.updated_at = Utc::now();
        state.store.put_driver(driver.clone());
        if busy {
            state.index.invalidate();
        }
        driver
    };

    info!(driver_id = %driver.user_id, busy, "driver busy flag updated");
    availability::publish_available(state);
    Ok(driver)
}

/// Caller must hold the store transaction latch.
fn upsert_locked(state: &AppState, user: &User) -> Result<Driver, AppError> {
    if user.role != UserRole::Driver {
        return Err(AppError::Validation(format!(
            "user {} is not a driver",
            user.id
        )));
    }

    if let Some(driver) = state.store.driver(user.id) {
        return Ok(driver);
    }

    let driver = Driver::new(user.id);
    state.store.put_driver(driver.clone());
    info!(driver_id = %driver.user_id, "driver profile created");
    Ok(driver)
}
