//! Order handlers. Creation goes through the admission protocol; there
//! is no way to commit an order around it.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::{to_api_error, ApiError};
use crate::models::{CreateOrderRequest, Order, UpdateOrderRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub client_id: Option<Uuid>,
}

/// POST /api/orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state.orders.create(request).await.map_err(to_api_error)?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/:id
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.get(id).await.map_err(to_api_error)?;
    Ok(Json(order))
}

/// GET /api/orders?clientId=...
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = match params.client_id {
        Some(client_id) => state.orders.list_by_client(client_id).await,
        None => state.orders.list().await,
    }
    .map_err(to_api_error)?;
    Ok(Json(orders))
}

/// PUT /api/orders/:id
pub async fn update_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .update(id, request)
        .await
        .map_err(to_api_error)?;
    Ok(Json(order))
}

/// DELETE /api/orders/:id
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.orders.delete(id).await.map_err(to_api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
