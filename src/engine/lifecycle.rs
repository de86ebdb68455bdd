use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::assignment;
use crate::engine::availability;
use crate::error::AppError;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::order::{Order, OrderStatus};
use crate::models::user::{User, UserRole};
use crate::state::AppState;

pub struct NewOrder {
    pub pickup: GeoPoint,
    pub pickup_address: String,
    pub dropoff: Option<GeoPoint>,
    pub dropoff_address: String,
    pub notes: String,
}

/// An order with its related records resolved.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub client: User,
    pub driver: Option<Driver>,
}

/// Persists a new order for `client` and immediately tries to hand it to
/// an available driver, all under one transaction hold.
///
/// Assignment is best effort: with no candidate (or a candidate that lost
/// the race since the index snapshot) the order stays `Created`. The core
/// never retries; re-running assignment for orphaned orders belongs to an
/// external poller.
pub async fn create_order(
    state: &AppState,
    client: &User,
    new_order: NewOrder,
) -> Result<Order, AppError> {
    if client.role != UserRole::Client {
        return Err(AppError::Validation(
            "only clients can create orders".to_string(),
        ));
    }

    let (order, assigned) = {
        let _txn = state.store.begin().await;

        let now = Utc::now();
        let order = Order {
            id: state.store.allocate_order_id(),
            client_id: client.id,
            driver_id: None,
            status: OrderStatus::Created,
            pickup: new_order.pickup,
            pickup_address: new_order.pickup_address,
            dropoff: new_order.dropoff,
            dropoff_address: new_order.dropoff_address,
            notes: new_order.notes,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            completed_at: None,
        };
        state.store.put_order(order.clone());
        state.metrics.orders_created_total.inc();
        info!(order_id = order.id, client_id = %client.id, "order created");

        match assignment::find_available_driver(state) {
            Some(driver) => match assignment::assign_locked(state, order.clone(), &driver) {
                Ok(assigned) => (assigned, true),
                Err(AppError::DriverUnavailable(_)) => {
                    // The index served a stale candidate; the live check
                    // rejected it. The order keeps waiting.
                    state
                        .metrics
                        .assignments_total
                        .with_label_values(&["no_driver"])
                        .inc();
                    warn!(order_id = order.id, "candidate driver lost the race");
                    (order, false)
                }
                Err(err) => return Err(err),
            },
            None => {
                state
                    .metrics
                    .assignments_total
                    .with_label_values(&["no_driver"])
                    .inc();
                warn!(order_id = order.id, "no available driver, order stays created");
                (order, false)
            }
        }
    };

    if assigned {
        availability::publish_available(state);
    }
    Ok(order)
}

/// Terminal transition: `Assigned` → `Completed`. Frees the attached
/// driver in the same transaction hold as the order-status write.
pub async fn complete_order(state: &AppState, order_id: u64) -> Result<Order, AppError> {
    let order = {
        let _txn = state.store.begin().await;

        let mut order = state
            .store
            .order(order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.status != OrderStatus::Assigned {
            return Err(AppError::InvalidState(format!(
                "order {} is {:?}, expected Assigned",
                order.id, order.status
            )));
        }

        let now = Utc::now();
        order.status = OrderStatus::Completed;
        order.completed_at = Some(now);
        order.updated_at = now;
        state.store.put_order(order.clone());

        if let Some(driver_id) = order.driver_id {
            if let Some(mut driver) = state.store.driver(driver_id) {
                driver.busy = false;
                driver.updated_at = now;
                state.store.put_driver(driver);
            }
        }
        state.index.invalidate();

        state.metrics.orders_completed_total.inc();
        info!(order_id = order.id, "order completed");
        order
    };

    availability::publish_available(state);
    Ok(order)
}

/// A client's created orders, or a driver's assigned orders, newest first.
pub fn list_for_user(state: &AppState, user: &User) -> Vec<Order> {
    match user.role {
        UserRole::Client => state.store.orders_for_client(user.id),
        UserRole::Driver => state.store.orders_for_driver(user.id),
    }
}

pub fn get_by_id(state: &AppState, order_id: u64) -> Result<OrderDetails, AppError> {
    let order = state
        .store
        .order(order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let client = state.store.user(order.client_id).ok_or_else(|| {
        AppError::Internal(format!(
            "client {} missing for order {order_id}",
            order.client_id
        ))
    })?;

    let driver = order.driver_id.and_then(|id| state.store.driver(id));

    Ok(OrderDetails {
        order,
        client,
        driver,
    })
}
