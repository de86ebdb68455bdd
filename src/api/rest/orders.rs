use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::assignment;
use crate::engine::lifecycle;
use crate::engine::lifecycle::{NewOrder, OrderDetails};
use crate::error::AppError;
use crate::models::driver::GeoPoint;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/assign", post(assign_order))
        .route("/orders/:id/complete", post(complete_order))
}

#[derive(Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub client_id: Uuid,
    pub pickup: LatLng,
    #[serde(default)]
    pub pickup_address: String,
    pub dropoff: Option<LatLng>,
    #[serde(default)]
    pub dropoff_address: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct AssignOrderRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct CompleteOrderRequest {
    pub driver_id: Uuid,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let client = state
        .store
        .user(payload.client_id)
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", payload.client_id)))?;

    let pickup = GeoPoint::new(payload.pickup.lat, payload.pickup.lng)?;
    let dropoff = match payload.dropoff {
        Some(point) => Some(GeoPoint::new(point.lat, point.lng)?),
        None => None,
    };

    let order = lifecycle::create_order(
        &state,
        &client,
        NewOrder {
            pickup,
            pickup_address: payload.pickup_address,
            dropoff,
            dropoff_address: payload.dropoff_address,
            notes: payload.notes,
        },
    )
    .await?;

    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<OrderDetails>, AppError> {
    Ok(Json(lifecycle::get_by_id(&state, id)?))
}

async fn assign_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<AssignOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = assignment::assign(&state, id, payload.driver_id).await?;
    Ok(Json(order))
}

async fn complete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<CompleteOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let details = lifecycle::get_by_id(&state, id)?;
    if details.order.driver_id != Some(payload.driver_id) {
        return Err(AppError::Permission(
            "you can only complete your own orders".to_string(),
        ));
    }

    let order = lifecycle::complete_order(&state, id).await?;
    Ok(Json(order))
}
