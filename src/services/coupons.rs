use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    entities::{
        coupon,
        coupon::{CouponKind, CouponScope},
        coupon_product,
    },
    errors::ServiceError,
};

/// A coupon that passed validation, together with the discount it grants
/// against the subtotal it was validated for.
#[derive(Debug, Clone)]
pub struct CouponQuote {
    pub coupon: coupon::Model,
    pub discount: Decimal,
}

/// Computes the discount a coupon grants on `subtotal`.
///
/// Fixed coupons grant their value, never more than the subtotal. Percent
/// coupons grant `subtotal * value / 100`, clamped to `max_discount_amount`
/// when one is set. The result is always within `[0, subtotal]`.
pub fn compute_discount(coupon: &coupon::Model, subtotal: Decimal) -> Decimal {
    let raw = match coupon.kind {
        CouponKind::Fixed => coupon.value,
        CouponKind::Percent => {
            let pct = subtotal * coupon.value / Decimal::from(100);
            match coupon.max_discount_amount {
                Some(cap) => pct.min(cap),
                None => pct,
            }
        }
    };
    raw.clamp(Decimal::ZERO, subtotal)
}

/// Validates a coupon code against an order subtotal at a given instant.
///
/// Checks run in a fixed order and stop at the first failure: existence,
/// active window, usage limit, order minimum, then product scope. The scope
/// check only runs when the caller knows the cart contents
/// (`cart_product_ids`); checkout always passes them.
///
/// `usage_limit == 0` means unlimited uses.
///
/// Validation never consumes usage; `used_count` moves only via
/// [`increment_usage`] inside a checkout transaction.
pub async fn validate<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    subtotal: Decimal,
    now: DateTime<Utc>,
    cart_product_ids: Option<&[i64]>,
) -> Result<CouponQuote, ServiceError> {
    let normalized = code.trim().to_uppercase();

    let coupon = coupon::Entity::find()
        .filter(coupon::Column::Code.eq(normalized.clone()))
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::CouponNotFound(format!("Coupon code {} does not exist", normalized))
        })?;

    if !coupon.is_active || now < coupon.start_at || now > coupon.end_at {
        return Err(ServiceError::CouponExpiredOrInactive(format!(
            "Coupon {} is not currently valid",
            coupon.code
        )));
    }

    if coupon.usage_limit > 0 && coupon.used_count >= coupon.usage_limit {
        return Err(ServiceError::CouponLimitReached(format!(
            "Coupon {} has no uses left",
            coupon.code
        )));
    }

    if subtotal < coupon.min_order_value {
        let shortfall = coupon.min_order_value - subtotal;
        return Err(ServiceError::CouponBelowMinimum(format!(
            "Coupon {} requires a minimum order of {}; add {} more to use it",
            coupon.code, coupon.min_order_value, shortfall
        )));
    }

    if coupon.scope == CouponScope::Specific {
        if let Some(product_ids) = cart_product_ids {
            let targets: Vec<i64> = coupon_product::Entity::find()
                .filter(coupon_product::Column::CouponId.eq(coupon.id))
                .all(conn)
                .await?
                .into_iter()
                .map(|row| row.product_id)
                .collect();

            if !product_ids.iter().any(|id| targets.contains(id)) {
                return Err(ServiceError::CouponNotApplicable(format!(
                    "Coupon {} does not apply to any product in this order",
                    coupon.code
                )));
            }
        }
    }

    let discount = compute_discount(&coupon, subtotal);
    Ok(CouponQuote { coupon, discount })
}

/// Bumps `used_count` by one, guarded so the counter can never pass the
/// limit even under concurrent checkouts. Must run inside the checkout
/// transaction so a rollback also reverts the bump.
pub async fn increment_usage<C: ConnectionTrait>(
    conn: &C,
    coupon_id: i64,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let result = coupon::Entity::update_many()
        .col_expr(
            coupon::Column::UsedCount,
            Expr::col(coupon::Column::UsedCount).add(1),
        )
        .col_expr(coupon::Column::UpdatedAt, Expr::value(now))
        .filter(coupon::Column::Id.eq(coupon_id))
        .filter(
            Condition::any()
                .add(coupon::Column::UsageLimit.eq(0))
                .add(Expr::col(coupon::Column::UsedCount).lt(Expr::col(coupon::Column::UsageLimit))),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::CouponLimitReached(
            "Coupon has no uses left".to_string(),
        ));
    }
    Ok(())
}

/// Coupon lookups used by the storefront outside of checkout.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
}

/// Response of the dry-run check endpoint. Reports the discount the coupon
/// would grant; nothing is consumed.
#[derive(Debug, Serialize)]
pub struct CouponCheck {
    pub code: String,
    pub discount: Decimal,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Dry-run validation for the storefront's "apply coupon" box.
    #[instrument(skip(self))]
    pub async fn check(
        &self,
        code: &str,
        subtotal: Decimal,
        now: DateTime<Utc>,
        cart_product_ids: Option<&[i64]>,
    ) -> Result<CouponCheck, ServiceError> {
        let quote = validate(&*self.db, code, subtotal, now, cart_product_ids).await?;
        Ok(CouponCheck {
            code: quote.coupon.code,
            discount: quote.discount,
        })
    }

    /// Publicly listable coupons usable right now: active, public, inside
    /// their window and not exhausted, best value first.
    #[instrument(skip(self))]
    pub async fn available(&self, now: DateTime<Utc>) -> Result<Vec<coupon::Model>, ServiceError> {
        let coupons = coupon::Entity::find()
            .filter(coupon::Column::IsActive.eq(true))
            .filter(coupon::Column::IsPublic.eq(true))
            .filter(coupon::Column::StartAt.lte(now))
            .filter(coupon::Column::EndAt.gte(now))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.eq(0))
                    .add(
                        Expr::col(coupon::Column::UsedCount)
                            .lt(Expr::col(coupon::Column::UsageLimit)),
                    ),
            )
            .order_by_desc(coupon::Column::Value)
            .all(&*self.db)
            .await?;
        Ok(coupons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn coupon_fixture(kind: CouponKind, value: Decimal, cap: Option<Decimal>) -> coupon::Model {
        let now = Utc::now();
        coupon::Model {
            id: 1,
            code: "SALE10".to_string(),
            name: "Test coupon".to_string(),
            kind,
            value,
            max_discount_amount: cap,
            min_order_value: Decimal::ZERO,
            usage_limit: 0,
            used_count: 0,
            start_at: now,
            end_at: now,
            is_active: true,
            is_public: true,
            scope: CouponScope::All,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        let coupon = coupon_fixture(CouponKind::Fixed, dec!(75000), None);
        assert_eq!(compute_discount(&coupon, dec!(50000)), dec!(50000));
        assert_eq!(compute_discount(&coupon, dec!(100000)), dec!(75000));
    }

    #[test]
    fn percent_discount_clamped_to_cap() {
        // SALE10: 10% of 500,000 is 50,000, but the cap is 20,000
        let coupon = coupon_fixture(CouponKind::Percent, dec!(10), Some(dec!(20000)));
        assert_eq!(compute_discount(&coupon, dec!(500000)), dec!(20000));
    }

    #[test]
    fn percent_discount_without_cap() {
        let coupon = coupon_fixture(CouponKind::Percent, dec!(10), None);
        assert_eq!(compute_discount(&coupon, dec!(500000)), dec!(50000));
    }

    #[test]
    fn zero_subtotal_grants_nothing() {
        let coupon = coupon_fixture(CouponKind::Percent, dec!(50), None);
        assert_eq!(compute_discount(&coupon, Decimal::ZERO), Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn discount_always_within_subtotal(
            value in 0u64..1_000_000,
            subtotal in 0u64..100_000_000,
            percent in 0u64..100,
            cap in proptest::option::of(0u64..1_000_000),
        ) {
            let subtotal = Decimal::from(subtotal);

            let fixed = coupon_fixture(CouponKind::Fixed, Decimal::from(value), None);
            let d = compute_discount(&fixed, subtotal);
            prop_assert!(d >= Decimal::ZERO && d <= subtotal);

            let pct = coupon_fixture(
                CouponKind::Percent,
                Decimal::from(percent),
                cap.map(Decimal::from),
            );
            let d = compute_discount(&pct, subtotal);
            prop_assert!(d >= Decimal::ZERO && d <= subtotal);
            if let Some(cap) = pct.max_discount_amount {
                prop_assert!(d <= cap.max(Decimal::ZERO));
            }
        }
    }
}
