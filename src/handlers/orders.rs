use crate::handlers::common::success_response;
use crate::{
    entities::order::OrderStatus,
    errors::ServiceError,
    services::orders::OrderListFilter,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

pub fn order_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/success/:hash_id", get(get_order_by_hash))
        .route("/:id_or_code", get(get_order))
        .route("/:id_or_code/status", put(update_order_status))
}

/// Public confirmation-page lookup through the opaque hash.
async fn get_order_by_hash(
    State(state): State<Arc<AppState>>,
    Path(hash_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_by_hash(&hash_id).await?;
    Ok(success_response(order))
}

/// Back-office lookup by numeric id or order code.
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id_or_code): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_by_id_or_code(&id_or_code).await?;
    Ok(success_response(order))
}

/// Paginated listing with optional status filter and free-text search.
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = params
        .status
        .as_deref()
        .map(|raw| {
            OrderStatus::from_str(raw).map_err(|_| {
                ServiceError::ValidationError(format!("Unknown order status: {}", raw))
            })
        })
        .transpose()?;

    let list = state
        .services
        .orders
        .list(OrderListFilter {
            status,
            search: params.q,
            page: params.page,
            limit: params.limit,
        })
        .await?;
    Ok(success_response(list))
}

/// Move an order along its lifecycle.
async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id_or_code): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let new_status = OrderStatus::from_str(&payload.status).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Unknown order status: {}; expected one of pending, processing, shipping, completed, cancelled, returned",
            payload.status
        ))
    })?;

    let order = state
        .services
        .order_status
        .update_status(&id_or_code, new_status, Utc::now())
        .await?;
    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub status: Option<String>,
    pub q: Option<String>,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}
