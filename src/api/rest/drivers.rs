use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::drivers;
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::user::User;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers/available", get(list_available))
        .route("/drivers/:user_id/online", post(set_online))
        .route("/drivers/:user_id/offline", post(set_offline))
        .route("/drivers/:user_id/location", patch(update_location))
        .route("/drivers/:user_id/busy", patch(set_busy))
        .route("/drivers/:user_id/status", get(driver_status))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
pub struct SetBusyRequest {
    pub busy: bool,
}

fn acting_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .store
        .user(user_id)
        .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))
}

async fn set_online(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let user = acting_user(&state, user_id)?;
    let driver = drivers::set_online(&state, &user).await?;
    Ok(Json(driver))
}

async fn set_offline(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let user = acting_user(&state, user_id)?;
    let driver = drivers::set_offline(&state, &user).await?;
    Ok(Json(driver))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    let user = acting_user(&state, user_id)?;
    let driver = drivers::update_location(&state, &user, payload.lat, payload.lng).await?;
    Ok(Json(driver))
}

async fn set_busy(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SetBusyRequest>,
) -> Result<Json<Driver>, AppError> {
    let user = acting_user(&state, user_id)?;
    let driver = drivers::set_busy(&state, &user, payload.busy).await?;
    Ok(Json(driver))
}

async fn driver_status(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Driver>, AppError> {
    let user = acting_user(&state, user_id)?;
    let driver = drivers::get_or_create(&state, &user).await?;
    Ok(Json(driver))
}

async fn list_available(State(state): State<Arc<AppState>>) -> Json<Vec<Driver>> {
    Json(state.index.get_available(&state.store, &state.metrics))
}
