//! Client handlers: CRUD, search, status toggling and profit reporting.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::{to_api_error, ApiError};
use crate::models::{
    Client, ClientProfit, ClientStatusRequest, CreateClientRequest, Order, UpdateClientRequest,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ClientListQuery {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfitRangeQuery {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

/// POST /api/clients
pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), ApiError> {
    let client = state.clients.create(request).await.map_err(to_api_error)?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /api/clients/:id
pub async fn get_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, ApiError> {
    let client = state.clients.get(id).await.map_err(to_api_error)?;
    Ok(Json(client))
}

/// GET /api/clients?query=...
pub async fn list_clients(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClientListQuery>,
) -> Result<Json<Vec<Client>>, ApiError> {
    let clients = state
        .clients
        .list_or_search(params.query.as_deref())
        .await
        .map_err(to_api_error)?;
    Ok(Json(clients))
}

/// PUT /api/clients/:id
pub async fn update_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateClientRequest>,
) -> Result<Json<Client>, ApiError> {
    let client = state
        .clients
        .update(id, request)
        .await
        .map_err(to_api_error)?;
    Ok(Json(client))
}

/// PATCH /api/clients/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ClientStatusRequest>,
) -> Result<Json<Client>, ApiError> {
    let client = state
        .clients
        .set_active(id, request.active)
        .await
        .map_err(to_api_error)?;
    Ok(Json(client))
}

/// GET /api/clients/:id/orders
pub async fn client_orders(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.clients.orders_of(id).await.map_err(to_api_error)?;
    Ok(Json(orders))
}

/// GET /api/clients/:id/profit
pub async fn client_profit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientProfit>, ApiError> {
    let profit = state.clients.profit(id).await.map_err(to_api_error)?;
    Ok(Json(profit))
}

/// GET /api/clients/profit-range?min=..&max=..
pub async fn profit_range(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProfitRangeQuery>,
) -> Result<Json<Vec<ClientProfit>>, ApiError> {
    let report = state
        .clients
        .profit_range(params.min, params.max)
        .await
        .map_err(to_api_error)?;
    Ok(Json(report))
}
