use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;

use lica_api::{
    config::AppConfig,
    db,
    entities::{
        coupon,
        coupon::{CouponKind, CouponScope},
        coupon_product, discount_item, discount_program,
        discount_program::ProgramKind,
        product,
    },
    events,
    AppState,
};

/// Helper harness for spinning up an application backed by a throwaway
/// SQLite database.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: tempfile::TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("lica_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1",
            18_080,
            "test",
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = Arc::new(AppState::new(Arc::new(pool), cfg, event_sender));
        let router = lica_api::app_router().with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Issue a request against the in-process router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => Request::builder().method(method).uri(uri).body(Body::empty()),
        }
        .expect("request build");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router oneshot")
    }

    pub async fn seed_product(&self, sku: &str, price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            name: Set(format!("Product {}", sku)),
            sku: Set(sku.to_string()),
            price: Set(price),
            stock_quantity: Set(stock),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    /// Seed a discount program covering `now` with a single product override.
    pub async fn seed_program(
        &self,
        name: &str,
        kind: ProgramKind,
        product_id: i64,
        override_price: Decimal,
        stock_cap: Option<i32>,
    ) -> discount_program::Model {
        self.seed_program_window(
            name,
            kind,
            product_id,
            override_price,
            stock_cap,
            Utc::now() - Duration::hours(1),
            Utc::now() + Duration::hours(1),
        )
        .await
    }

    pub async fn seed_program_window(
        &self,
        name: &str,
        kind: ProgramKind,
        product_id: i64,
        override_price: Decimal,
        stock_cap: Option<i32>,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> discount_program::Model {
        let now = Utc::now();
        let program = discount_program::ActiveModel {
            name: Set(name.to_string()),
            kind: Set(kind),
            start_at: Set(start_at),
            end_at: Set(end_at),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed program");

        discount_item::ActiveModel {
            program_id: Set(program.id),
            product_id: Set(product_id),
            override_price: Set(override_price),
            stock_cap: Set(stock_cap),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed program item");

        program
    }

    pub async fn seed_coupon(&self, seed: CouponSeed<'_>) -> coupon::Model {
        let now = Utc::now();
        let coupon = coupon::ActiveModel {
            code: Set(seed.code.to_string()),
            name: Set(format!("Coupon {}", seed.code)),
            kind: Set(seed.kind),
            value: Set(seed.value),
            max_discount_amount: Set(seed.max_discount_amount),
            min_order_value: Set(seed.min_order_value),
            usage_limit: Set(seed.usage_limit),
            used_count: Set(0),
            start_at: Set(now - Duration::hours(1)),
            end_at: Set(now + Duration::hours(1)),
            is_active: Set(seed.is_active),
            is_public: Set(true),
            scope: Set(seed.scope),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed coupon");

        for product_id in seed.product_ids {
            coupon_product::ActiveModel {
                coupon_id: Set(coupon.id),
                product_id: Set(*product_id),
                ..Default::default()
            }
            .insert(&*self.state.db)
            .await
            .expect("seed coupon product");
        }

        coupon
    }
}

/// Coupon fixture parameters; defaults describe a live unrestricted coupon.
pub struct CouponSeed<'a> {
    pub code: &'a str,
    pub kind: CouponKind,
    pub value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_value: Decimal,
    pub usage_limit: i32,
    pub is_active: bool,
    pub scope: CouponScope,
    pub product_ids: &'a [i64],
}

impl Default for CouponSeed<'_> {
    fn default() -> Self {
        Self {
            code: "TEST",
            kind: CouponKind::Fixed,
            value: Decimal::ZERO,
            max_discount_amount: None,
            min_order_value: Decimal::ZERO,
            usage_limit: 0,
            is_active: true,
            scope: CouponScope::All,
            product_ids: &[],
        }
    }
}

/// Decode a JSON response body.
pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Assert status and decode in one step, printing the body on mismatch.
pub async fn expect_status(response: Response, expected: StatusCode) -> Value {
    let status = response.status();
    let body = response_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {}", body);
    body
}
