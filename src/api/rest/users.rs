use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::order::Order;
use crate::models::user::{User, UserRole};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/:user_id/orders", get(list_user_orders))
}

#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub role: UserRole,
    #[serde(default)]
    pub phone_number: String,
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::Validation("username cannot be empty".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        username: payload.username,
        role: payload.role,
        phone_number: payload.phone_number,
        created_at: Utc::now(),
    };

    state.store.insert_user(user.clone());
    Ok(Json(user))
}

async fn list_user_orders(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, AppError> {
    let user = state
        .store
        .user(user_id)
        .ok_or_else(|| AppError::NotFound(format!("user {user_id} not found")))?;

    Ok(Json(lifecycle::list_for_user(&state, &user)))
}
