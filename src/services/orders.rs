use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    entities::{order, order::OrderStatus, order_item},
    errors::ServiceError,
};

/// An order with its line items, as returned to clients.
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
    /// Number of orders per lifecycle status, across all pages.
    pub status_counts: HashMap<String, i64>,
}

/// Finds an order by numeric id or by its public order code.
pub async fn find_by_id_or_code<C: ConnectionTrait>(
    conn: &C,
    id_or_code: &str,
) -> Result<Option<order::Model>, ServiceError> {
    if let Ok(id) = id_or_code.parse::<i64>() {
        if let Some(found) = order::Entity::find_by_id(id).one(conn).await? {
            return Ok(Some(found));
        }
    }
    let found = order::Entity::find()
        .filter(order::Column::Code.eq(id_or_code))
        .one(conn)
        .await?;
    Ok(found)
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Looks up an order through its opaque hash, for the public
    /// confirmation page. The numeric id is never accepted here.
    #[instrument(skip(self))]
    pub async fn get_by_hash(&self, hash_id: &str) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find()
            .filter(order::Column::HashId.eq(hash_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        self.with_items(order).await
    }

    /// Back-office lookup by id or code.
    #[instrument(skip(self))]
    pub async fn get_by_id_or_code(&self, id_or_code: &str) -> Result<OrderWithItems, ServiceError> {
        let order = find_by_id_or_code(&*self.db, id_or_code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id_or_code)))?;

        self.with_items(order).await
    }

    async fn with_items(&self, order: order::Model) -> Result<OrderWithItems, ServiceError> {
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(OrderWithItems { order, items })
    }

    /// Paginated order listing for the back office, newest first. The free
    /// text search matches order code, customer name and phone number.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: OrderListFilter) -> Result<OrderList, ServiceError> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 100);

        let mut query = order::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term);
            query = query.filter(
                Condition::any()
                    .add(order::Column::Code.like(pattern.clone()))
                    .add(order::Column::CustomerName.like(pattern.clone()))
                    .add(order::Column::CustomerPhone.like(pattern)),
            );
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, limit);
        let counts = paginator.num_items_and_pages().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        let grouped: Vec<(OrderStatus, i64)> = order::Entity::find()
            .select_only()
            .column(order::Column::Status)
            .column_as(order::Column::Id.count(), "count")
            .group_by(order::Column::Status)
            .into_tuple()
            .all(&*self.db)
            .await?;
        let status_counts = grouped
            .into_iter()
            .map(|(status, count)| (status.to_string(), count))
            .collect();

        Ok(OrderList {
            orders,
            total: counts.number_of_items,
            page,
            limit,
            total_pages: counts.number_of_pages,
            status_counts,
        })
    }
}
