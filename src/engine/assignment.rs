use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::engine::availability;
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

/// Picks the first driver in the index's natural order (most recent
/// registration first). There is deliberately no ranking by distance,
/// rating, or load; the result is a candidate hint and `assign` re-checks
/// live state before committing.
pub fn find_available_driver(state: &AppState) -> Option<Driver> {
    state
        .index
        .get_available(&state.store, &state.metrics)
        .into_iter()
        .next()
}

/// Binds one order to one driver and flips the driver busy, as a single
/// transaction. A failed precondition leaves both records untouched.
pub async fn assign(state: &AppState, order_id: u64, driver_id: Uuid) -> Result<Order, AppError> {
    let order = {
        let _txn = state.store.begin().await;

        let order = state
            .store
            .order(order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let driver = state
            .store
            .driver(driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        assign_locked(state, order, &driver)?
    };

    availability::publish_available(state);
    Ok(order)
}

/// Performs the guarded dual-entity transition. Caller must hold the
/// store transaction latch and pass a driver record read under it; the
/// availability check here runs against that live record, never against
/// a cached snapshot.
pub(crate) fn assign_locked(
    state: &AppState,
    mut order: Order,
    driver: &Driver,
) -> Result<Order, AppError> {
    if order.status != OrderStatus::Created {
        return Err(AppError::InvalidState(format!(
            "order {} is {:?}, expected Created",
            order.id, order.status
        )));
    }

    if !driver.available() {
        return Err(AppError::DriverUnavailable(format!(
            "driver {} is offline or busy",
            driver.user_id
        )));
    }

    let now = Utc::now();
    order.driver_id = Some(driver.user_id);
    order.status = OrderStatus::Assigned;
    order.assigned_at = Some(now);
    order.updated_at = now;
    state.store.put_order(order.clone());

    let mut updated_driver = driver.clone();
    updated_driver.busy = true;
    updated_driver.updated_at = now;
    state.store.put_driver(updated_driver);
    state.index.invalidate();

    state
        .metrics
        .assignments_total
        .with_label_values(&["assigned"])
        .inc();
    info!(order_id = order.id, driver_id = %driver.user_id, "order assigned");

    Ok(order)
}
