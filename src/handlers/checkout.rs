use crate::handlers::common::{created_response, validate_input};
use crate::{
    errors::ServiceError,
    services::checkout::{CheckoutInput, CheckoutLine},
    AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(place_order))
}

/// Place an order from the submitted cart. Prices and discounts are
/// recomputed server-side; the payload only carries product ids and
/// quantities.
async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let input = CheckoutInput {
        customer_id: payload.customer_id,
        customer_name: payload.customer_name,
        customer_phone: payload.customer_phone,
        customer_email: payload.customer_email,
        shipping_address: payload.shipping_address,
        note: payload.note,
        payment_method: payload.payment_method,
        coupon_code: payload.coupon_code,
        lines: payload
            .items
            .into_iter()
            .map(|item| CheckoutLine {
                product_id: item.product_id,
                quantity: item.quantity,
                options: item.options,
            })
            .collect(),
    };

    let reference = state.services.checkout.checkout(input, Utc::now()).await?;
    Ok(created_response(reference))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub customer_id: Option<i64>,
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(length(min = 8, message = "Phone number is required"))]
    pub customer_phone: String,
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub shipping_address: String,
    pub note: Option<String>,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    pub coupon_code: Option<String>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CheckoutItemRequest>,
}

// Serialize is needed so the length validator can report the offending value.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutItemRequest {
    pub product_id: i64,
    pub quantity: i32,
    pub options: Option<serde_json::Value>,
}
