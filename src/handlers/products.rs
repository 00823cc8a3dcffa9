use crate::handlers::common::success_response;
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use std::sync::Arc;

pub fn product_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:id/price", get(get_product_price))
}

/// Effective selling price for one product right now, with the program it
/// came from when a discount applies.
async fn get_product_price(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError> {
    let price = state.services.pricing.product_price(id, Utc::now()).await?;
    Ok(success_response(price))
}
