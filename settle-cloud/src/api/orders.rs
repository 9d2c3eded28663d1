//! Order checkout and admin endpoints

use super::{ApiResult, json_body};
use crate::auth;
use crate::error::ServiceError;
use crate::orders::{CreateOrderRequest, OrderUpdateRequest};
use crate::state::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use shared::models::{Order, OrderCreated};

/// POST /api/restaurants/{restaurant}/orders (slug or id)
pub async fn create_order(
    State(state): State<AppState>,
    Path(restaurant): Path<String>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderCreated>), ServiceError> {
    let request = json_body(payload)?;
    let order = state.orders.create_order(&restaurant, request).await?;
    Ok((StatusCode::CREATED, Json(OrderCreated::from(&order))))
}

/// GET /api/orders/{id}
pub async fn get_order(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Order> {
    Ok(Json(state.orders.get_order(&id).await?))
}

/// DELETE /api/orders/{id}, refused once the order is paid
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.orders.delete_order(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/orders/{id}
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<OrderUpdateRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let request = json_body(payload)?;
    let caps = auth::capabilities(&headers, &state.config);
    Ok(Json(state.orders.update_order(&id, request, caps).await?))
}
