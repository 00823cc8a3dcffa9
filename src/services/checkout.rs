use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        order,
        order::{OrderStatus, PaymentStatus},
        order_item, product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{coupons, pricing},
};

/// One requested cart line. Prices are never accepted from the client; only
/// the product id and quantity matter.
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub product_id: i64,
    pub quantity: i32,
    pub options: Option<serde_json::Value>,
}

/// Everything checkout needs, already shape-validated by the handler.
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub customer_id: Option<i64>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub shipping_address: String,
    pub note: Option<String>,
    pub payment_method: String,
    pub coupon_code: Option<String>,
    pub lines: Vec<CheckoutLine>,
}

/// Durable reference handed to the customer. The confirmation page fetches
/// the order through `hash_id`, never through the numeric id.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReference {
    pub order_code: String,
    pub hash_id: String,
    pub redirect_url: String,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Places an order. Everything between the first stock read and the final
    /// insert happens in one transaction: a failure at any step (missing
    /// product, insufficient stock, coupon rejection, storage error) rolls
    /// back every stock decrement, the coupon usage bump and the order rows.
    #[instrument(skip(self, input), fields(lines = input.lines.len()))]
    pub async fn checkout(
        &self,
        input: CheckoutInput,
        now: DateTime<Utc>,
    ) -> Result<OrderReference, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }
        for line in &input.lines {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity for product {} must be at least 1",
                    line.product_id
                )));
            }
        }

        let txn = self.db.begin().await?;

        // Lock rows in ascending product-id order so two checkouts sharing
        // products can never deadlock on each other.
        let mut lines: Vec<CheckoutLine> = input.lines.clone();
        lines.sort_by_key(|l| l.product_id);

        let mut subtotal = Decimal::ZERO;
        let mut snapshots = Vec::with_capacity(lines.len());
        let mut product_ids = Vec::with_capacity(lines.len());

        for line in &lines {
            // SELECT ... FOR UPDATE on Postgres. SQLite has no row locks;
            // its single-writer transaction gives the same guarantee.
            let mut query = product::Entity::find_by_id(line.product_id);
            if txn.get_database_backend() == DatabaseBackend::Postgres {
                query = query.lock_exclusive();
            }
            let product = query.one(&txn).await?.ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Product {} does not exist",
                    line.product_id
                ))
            })?;

            if product.stock_quantity < line.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "Product {} has only {} in stock",
                    product.name, product.stock_quantity
                )));
            }

            let resolved = pricing::resolve_price(&txn, &product, now).await?;
            let line_total = resolved.unit_price * Decimal::from(line.quantity);
            subtotal += line_total;
            product_ids.push(product.id);

            let mut active: product::ActiveModel = product.clone().into();
            active.stock_quantity = Set(product.stock_quantity - line.quantity);
            active.updated_at = Set(now);
            active.update(&txn).await?;

            snapshots.push(LineSnapshot {
                product_id: product.id,
                product_name: product.name,
                sku: product.sku,
                quantity: line.quantity,
                unit_price: resolved.unit_price,
                total: line_total,
                options: line.options.clone(),
            });
        }

        // A supplied coupon is re-validated against the server-side subtotal;
        // any rejection fails the whole checkout rather than silently
        // dropping the discount.
        let mut discount = Decimal::ZERO;
        let mut coupon_snapshot = None;
        let mut redeemed_coupon = None;
        if let Some(code) = input
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            let quote = coupons::validate(&txn, code, subtotal, now, Some(&product_ids)).await?;
            coupons::increment_usage(&txn, quote.coupon.id, now).await?;
            discount = quote.discount;
            coupon_snapshot = Some(quote.coupon.code.clone());
            redeemed_coupon = Some((quote.coupon.id, quote.coupon.code));
        }

        let total = (subtotal - discount).max(Decimal::ZERO);
        let code = generate_order_code(now);
        let hash_id = generate_hash_id();

        let order = order::ActiveModel {
            code: Set(code.clone()),
            hash_id: Set(hash_id.clone()),
            customer_id: Set(input.customer_id),
            customer_name: Set(input.customer_name),
            customer_phone: Set(input.customer_phone),
            customer_email: Set(input.customer_email),
            shipping_address: Set(input.shipping_address),
            note: Set(input.note),
            subtotal: Set(subtotal),
            discount_amount: Set(discount),
            shipping_fee: Set(Decimal::ZERO),
            total_amount: Set(total),
            payment_method: Set(input.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            coupon_code: Set(coupon_snapshot),
            status: Set(OrderStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let order = order.insert(&txn).await?;

        for snapshot in snapshots {
            let item = order_item::ActiveModel {
                order_id: Set(order.id),
                product_id: Set(snapshot.product_id),
                product_name: Set(snapshot.product_name),
                sku: Set(snapshot.sku),
                quantity: Set(snapshot.quantity),
                unit_price: Set(snapshot.unit_price),
                total: Set(snapshot.total),
                options: Set(snapshot.options),
                created_at: Set(now),
                ..Default::default()
            };
            item.insert(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send(Event::OrderCreated {
                order_id: order.id,
                code: order.code.clone(),
            })
            .await;
        if let Some((coupon_id, coupon_code)) = redeemed_coupon {
            self.event_sender
                .send(Event::CouponRedeemed {
                    coupon_id,
                    code: coupon_code,
                    order_id: order.id,
                })
                .await;
        }

        info!(order_id = order.id, code = %order.code, %total, "checkout committed");

        Ok(OrderReference {
            redirect_url: format!("/order/success/{}", hash_id),
            order_code: code,
            hash_id,
        })
    }
}

struct LineSnapshot {
    product_id: i64,
    product_name: String,
    sku: String,
    quantity: i32,
    unit_price: Decimal,
    total: Decimal,
    options: Option<serde_json::Value>,
}

/// Human-readable order code, e.g. `LICA63B7A2F41C9E852`. Microsecond
/// timestamp plus a random suffix keeps codes unique even for back-to-back
/// checkouts.
fn generate_order_code(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(10..100);
    format!("LICA{:X}{}", now.timestamp_micros(), suffix)
}

/// Opaque token for public order lookup; not derivable from the order id.
fn generate_hash_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_code_carries_prefix() {
        let code = generate_order_code(Utc::now());
        assert!(code.starts_with("LICA"));
        assert!(code.len() > 8);
    }

    #[test]
    fn hash_id_is_opaque_hex() {
        let hash = generate_hash_id();
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash, generate_hash_id());
    }
}
