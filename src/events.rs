use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted by the checkout and lifecycle services after their
/// transactions commit. Consumers run out-of-band; nothing in the core waits
/// on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i64,
        code: String,
    },
    OrderStatusChanged {
        order_id: i64,
        old_status: String,
        new_status: String,
    },
    CouponRedeemed {
        coupon_id: i64,
        code: String,
        order_id: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging (not failing) when the consumer is gone.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Event dropped, consumer unavailable: {}", e);
        }
    }
}

/// Builds a sender plus the logging consumer loop for it.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event queue, logging each event. Spawned once at startup.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated { order_id, code } => {
                info!(order_id, %code, "order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id, %old_status, %new_status, "order status changed");
            }
            Event::CouponRedeemed {
                coupon_id,
                code,
                order_id,
            } => {
                info!(coupon_id, %code, order_id, "coupon redeemed");
            }
        }
    }
}
