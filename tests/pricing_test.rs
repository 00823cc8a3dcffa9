//! Price resolution tests: program precedence, windows and the public price
//! endpoint.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{expect_status, TestApp};
use lica_api::entities::discount_program::ProgramKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use std::str::FromStr;

fn money(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("money field should be a string"))
        .expect("money field should parse")
}

#[tokio::test]
async fn base_price_when_no_program_is_live() {
    let app = TestApp::new().await;
    let serum = app.seed_product("PRICE-01", dec!(300000), 10).await;

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}/price", serum.id), None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(money(&body["base_price"]), dec!(300000));
    assert_eq!(money(&body["effective_price"]), dec!(300000));
    assert_eq!(body["has_discount"], false);
    assert!(body["source"].is_null());
}

#[tokio::test]
async fn flash_sale_beats_promotion() {
    let app = TestApp::new().await;
    let serum = app.seed_product("PRICE-02", dec!(300000), 10).await;
    app.seed_program("Spring Promo", ProgramKind::Promotion, serum.id, dec!(270000), None)
        .await;
    let flash = app
        .seed_program("Midnight Flash", ProgramKind::FlashSale, serum.id, dec!(210000), Some(50))
        .await;

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}/price", serum.id), None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(money(&body["effective_price"]), dec!(210000));
    assert_eq!(body["has_discount"], true);
    assert_eq!(body["source"]["program_id"], flash.id);
    assert_eq!(body["source"]["kind"], "flash_sale");
    assert_eq!(body["source"]["stock_cap"], 50);
}

#[tokio::test]
async fn promotion_applies_when_no_flash_sale() {
    let app = TestApp::new().await;
    let serum = app.seed_product("PRICE-03", dec!(300000), 10).await;
    app.seed_program("Members Promo", ProgramKind::Promotion, serum.id, dec!(270000), None)
        .await;

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}/price", serum.id), None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(money(&body["effective_price"]), dec!(270000));
    assert_eq!(body["source"]["kind"], "promotion");
}

#[tokio::test]
async fn expired_and_future_programs_are_ignored() {
    let app = TestApp::new().await;
    let serum = app.seed_product("PRICE-04", dec!(300000), 10).await;
    let now = Utc::now();
    app.seed_program_window(
        "Last Week",
        ProgramKind::FlashSale,
        serum.id,
        dec!(150000),
        None,
        now - Duration::days(10),
        now - Duration::days(3),
    )
    .await;
    app.seed_program_window(
        "Next Week",
        ProgramKind::FlashSale,
        serum.id,
        dec!(180000),
        None,
        now + Duration::days(3),
        now + Duration::days(10),
    )
    .await;

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}/price", serum.id), None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(money(&body["effective_price"]), dec!(300000));
    assert_eq!(body["has_discount"], false);
}

#[tokio::test]
async fn tied_flash_sales_resolve_to_lowest_program_id() {
    let app = TestApp::new().await;
    let serum = app.seed_product("PRICE-05", dec!(300000), 10).await;
    let first = app
        .seed_program("Flash A", ProgramKind::FlashSale, serum.id, dec!(250000), None)
        .await;
    app.seed_program("Flash B", ProgramKind::FlashSale, serum.id, dec!(220000), None)
        .await;

    let response = app
        .request(Method::GET, &format!("/api/v1/products/{}/price", serum.id), None)
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["source"]["program_id"], first.id);
    assert_eq!(money(&body["effective_price"]), dec!(250000));
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/products/42/price", None).await;
    let body = expect_status(response, StatusCode::NOT_FOUND).await;
    assert_eq!(body["code"], "NOT_FOUND");
}
