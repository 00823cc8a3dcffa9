//! Order lifecycle tests: legal progression, illegal jumps, terminal states
//! and the back-office listing.

mod common;

use axum::http::{Method, StatusCode};
use common::{expect_status, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn place_order(app: &TestApp, product_id: i64, customer_name: &str) -> String {
    let payload = json!({
        "customer_name": customer_name,
        "customer_phone": "0909090909",
        "shipping_address": "3 Nguyen Hue, HCMC",
        "payment_method": "cod",
        "items": [{"product_id": product_id, "quantity": 1}],
    });
    let response = app.request(Method::POST, "/api/v1/checkout", Some(payload)).await;
    let body = expect_status(response, StatusCode::CREATED).await;
    body["order_code"].as_str().unwrap().to_string()
}

async fn set_status(app: &TestApp, code: &str, status: &str) -> axum::response::Response {
    app.request(
        Method::PUT,
        &format!("/api/v1/orders/{}/status", code),
        Some(json!({"status": status})),
    )
    .await
}

#[tokio::test]
async fn full_lifecycle_to_completion_marks_paid() {
    let app = TestApp::new().await;
    let product = app.seed_product("LIFE-01", dec!(100000), 10).await;
    let code = place_order(&app, product.id, "Hoa Nguyen").await;

    for next in ["processing", "shipping"] {
        let response = set_status(&app, &code, next).await;
        let body = expect_status(response, StatusCode::OK).await;
        assert_eq!(body["status"], next);
        assert_eq!(body["payment_status"], "pending");
    }

    let response = set_status(&app, &code, "completed").await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["payment_status"], "paid");

    // Completed is terminal; a delivered order cannot come back.
    let response = set_status(&app, &code, "returned").await;
    let body = expect_status(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn shipping_orders_may_be_returned_instead_of_completed() {
    let app = TestApp::new().await;
    let product = app.seed_product("LIFE-06", dec!(100000), 10).await;
    let code = place_order(&app, product.id, "Nga Bui").await;

    for next in ["processing", "shipping"] {
        let response = set_status(&app, &code, next).await;
        expect_status(response, StatusCode::OK).await;
    }

    let response = set_status(&app, &code, "returned").await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["status"], "returned");
    // A return never settles payment.
    assert_eq!(body["payment_status"], "pending");
}

#[tokio::test]
async fn cancellation_is_only_possible_while_pending() {
    let app = TestApp::new().await;
    let product = app.seed_product("LIFE-07", dec!(100000), 10).await;
    let code = place_order(&app, product.id, "Tam Ho").await;

    let response = set_status(&app, &code, "processing").await;
    expect_status(response, StatusCode::OK).await;

    // Once staff has confirmed the order, cancellation is off the table.
    let response = set_status(&app, &code, "cancelled").await;
    let body = expect_status(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn stage_skipping_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("LIFE-02", dec!(100000), 10).await;
    let code = place_order(&app, product.id, "Thu Le").await;

    for illegal in ["shipping", "completed", "returned"] {
        let response = set_status(&app, &code, illegal).await;
        let body = expect_status(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(body["code"], "INVALID_TRANSITION");
    }

    // The order is untouched after the rejected attempts.
    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{}", code), None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn cancelled_orders_are_terminal() {
    let app = TestApp::new().await;
    let product = app.seed_product("LIFE-03", dec!(100000), 10).await;
    let code = place_order(&app, product.id, "Quang Vo").await;

    let response = set_status(&app, &code, "cancelled").await;
    expect_status(response, StatusCode::OK).await;

    for attempt in ["pending", "processing", "shipping", "completed", "returned"] {
        let response = set_status(&app, &code, attempt).await;
        let body = expect_status(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(body["code"], "INVALID_TRANSITION");
    }
}

#[tokio::test]
async fn unknown_status_and_order_are_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("LIFE-04", dec!(100000), 10).await;
    let code = place_order(&app, product.id, "An Dang").await;

    let response = set_status(&app, &code, "teleported").await;
    let body = expect_status(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["code"], "VALIDATION");

    let response = set_status(&app, "LICA0NOSUCH", "processing").await;
    let body = expect_status(response, StatusCode::NOT_FOUND).await;
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn listing_filters_by_status_and_search() {
    let app = TestApp::new().await;
    let product = app.seed_product("LIFE-05", dec!(100000), 20).await;

    let first = place_order(&app, product.id, "Bao Tran").await;
    let _second = place_order(&app, product.id, "Chi Mai").await;
    let third = place_order(&app, product.id, "Bao Chau").await;

    let response = set_status(&app, &first, "processing").await;
    expect_status(response, StatusCode::OK).await;

    let response = app.request(Method::GET, "/api/v1/orders", None).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["status_counts"]["pending"], 2);
    assert_eq!(body["status_counts"]["processing"], 1);

    let response = app
        .request(Method::GET, "/api/v1/orders?status=processing", None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["orders"][0]["code"], first);

    // Free-text search matches the customer name.
    let response = app.request(Method::GET, "/api/v1/orders?q=Bao", None).await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["total"], 2);

    let response = app
        .request(Method::GET, &format!("/api/v1/orders?q={}", third), None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["total"], 1);

    let response = app
        .request(Method::GET, "/api/v1/orders?status=warehouse", None)
        .await;
    let body = expect_status(response, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["code"], "VALIDATION");
}
