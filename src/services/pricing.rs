use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    entities::{
        discount_item, discount_program,
        discount_program::ProgramKind,
        product,
    },
    errors::ServiceError,
};

/// Outcome of price resolution for one product at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedPrice {
    pub unit_price: Decimal,
    /// The program the price came from; `None` means base price.
    pub source: Option<PriceSource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceSource {
    pub program_id: i64,
    pub program_name: String,
    pub kind: ProgramKind,
    pub stock_cap: Option<i32>,
}

/// A live discount program entry for a product, as exposed to collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveProgram {
    pub program_id: i64,
    pub program_name: String,
    pub kind: ProgramKind,
    pub override_price: Decimal,
    pub stock_cap: Option<i32>,
}

/// Returns every discount item covering `product_id` whose program is active
/// and whose window contains `now`, ordered by program id so callers see a
/// stable ordering.
pub async fn active_programs<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<ActiveProgram>, ServiceError> {
    let rows = discount_item::Entity::find()
        .find_also_related(discount_program::Entity)
        .filter(discount_item::Column::ProductId.eq(product_id))
        .filter(discount_program::Column::IsActive.eq(true))
        .filter(discount_program::Column::StartAt.lte(now))
        .filter(discount_program::Column::EndAt.gte(now))
        .order_by_asc(discount_program::Column::Id)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(item, program)| {
            program.map(|p| ActiveProgram {
                program_id: p.id,
                program_name: p.name,
                kind: p.kind,
                override_price: item.override_price,
                stock_cap: item.stock_cap,
            })
        })
        .collect())
}

/// Resolves the effective selling price for a product.
///
/// Flash-sale overrides win over promotion overrides; with several programs
/// of the same kind live at once, the lowest program id wins so the result
/// is deterministic. With no live program the base price is returned.
///
/// An override above the base price is returned as-is; whether to render a
/// "discount" badge is the caller's concern (`unit_price < product.price`).
pub async fn resolve_price<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    now: DateTime<Utc>,
) -> Result<ResolvedPrice, ServiceError> {
    let programs = active_programs(conn, product.id, now).await?;

    let pick = programs
        .iter()
        .find(|p| p.kind == ProgramKind::FlashSale)
        .or_else(|| programs.iter().find(|p| p.kind == ProgramKind::Promotion));

    Ok(match pick {
        Some(p) => ResolvedPrice {
            unit_price: p.override_price,
            source: Some(PriceSource {
                program_id: p.program_id,
                program_name: p.program_name.clone(),
                kind: p.kind,
                stock_cap: p.stock_cap,
            }),
        },
        None => ResolvedPrice {
            unit_price: product.price,
            source: None,
        },
    })
}

/// Storefront-facing view over [`resolve_price`].
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
}

/// What the storefront renders on a product card.
#[derive(Debug, Serialize)]
pub struct ProductPrice {
    pub product_id: i64,
    pub base_price: Decimal,
    pub effective_price: Decimal,
    pub has_discount: bool,
    pub source: Option<PriceSource>,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn product_price(
        &self,
        product_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ProductPrice, ServiceError> {
        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let resolved = resolve_price(&*self.db, &product, now).await?;

        Ok(ProductPrice {
            product_id: product.id,
            base_price: product.price,
            has_discount: resolved.unit_price < product.price,
            effective_price: resolved.unit_price,
            source: resolved.source,
        })
    }
}
