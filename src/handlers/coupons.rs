use crate::handlers::common::{success_response, validate_input};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn coupon_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/check", post(check_coupon))
        .route("/available", get(available_coupons))
}

/// Dry-run coupon validation for the storefront. Consumes nothing.
async fn check_coupon(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckCouponRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let result = state
        .services
        .coupons
        .check(
            &payload.code,
            payload.total,
            Utc::now(),
            payload.product_ids.as_deref(),
        )
        .await?;
    Ok(success_response(result))
}

/// Coupons the storefront may advertise right now.
async fn available_coupons(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let coupons = state.services.coupons.available(Utc::now()).await?;
    Ok(success_response(coupons))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"))]
    pub code: String,
    /// Cart total the coupon would apply to.
    pub total: Decimal,
    pub product_ids: Option<Vec<i64>>,
}
