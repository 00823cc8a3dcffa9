pub mod checkout;
pub mod common;
pub mod coupons;
pub mod orders;
pub mod products;

use crate::{
    events::EventSender,
    services::{
        checkout::CheckoutService, coupons::CouponService, order_status::OrderStatusService,
        orders::OrderService, pricing::PricingService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Container for all application services, shared through [`crate::AppState`].
#[derive(Clone)]
pub struct AppServices {
    pub pricing: PricingService,
    pub coupons: CouponService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub order_status: OrderStatusService,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            pricing: PricingService::new(db.clone()),
            coupons: CouponService::new(db.clone()),
            checkout: CheckoutService::new(db.clone(), event_sender.clone()),
            orders: OrderService::new(db.clone()),
            order_status: OrderStatusService::new(db, event_sender),
        }
    }
}
