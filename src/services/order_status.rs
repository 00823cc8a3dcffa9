use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::{
    entities::{
        order,
        order::{OrderStatus, PaymentStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders,
};

/// Whether an order may move from `from` to `to`.
///
/// The lifecycle is a forward-only chain: pending -> processing -> shipping,
/// then delivery either completes the order or turns into a return.
/// Cancellation is only possible while the order is still pending;
/// `completed`, `cancelled` and `returned` are terminal.
pub fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Pending, Processing)
            | (Pending, Cancelled)
            | (Processing, Shipping)
            | (Shipping, Completed)
            | (Shipping, Returned)
    )
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Moves an order to a new status, rejecting anything outside the
    /// lifecycle table. Completing an order also marks it paid; cash on
    /// delivery settles at the door.
    #[instrument(skip(self), fields(order = %id_or_code, to = %new_status))]
    pub async fn update_status(
        &self,
        id_or_code: &str,
        new_status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = orders::find_by_id_or_code(&txn, id_or_code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id_or_code)))?;

        let old_status = existing.status;
        if !transition_allowed(old_status, new_status) {
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} cannot move from {} to {}",
                existing.code, old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = existing.into();
        active.status = Set(new_status);
        if new_status == OrderStatus::Completed {
            active.payment_status = Set(PaymentStatus::Paid);
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id: updated.id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        info!(order_id = updated.id, %old_status, %new_status, "order status updated");
        Ok(updated)
    }
}
