use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::OrderState;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiving half of a bounded channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Callers publish only after their transaction has committed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping domain event");
        }
    }
}

/// Domain events published after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    UserProvisioned {
        user_id: Uuid,
        cart_id: Uuid,
        wish_list_id: Uuid,
    },
    UserBanned {
        user_id: Uuid,
    },
    UserUnbanned {
        user_id: Uuid,
    },

    // Cart events
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        product_id: Uuid,
    },

    // Wish list events
    WishListItemAdded {
        wish_list_id: Uuid,
        product_id: Uuid,
    },
    WishListItemRemoved {
        wish_list_id: Uuid,
        product_id: Uuid,
    },

    // Order events
    OrderCreated {
        order_id: Uuid,
        user_id: Uuid,
        item_count: usize,
        total: Decimal,
    },
    OrderStateChanged {
        order_id: Uuid,
        from: OrderState,
        to: OrderState,
    },

    // Default selection events
    DefaultPaymentMethodChanged {
        user_id: Uuid,
        payment_method_id: Uuid,
    },
    DefaultAddressChanged {
        user_id: Uuid,
        address_id: Uuid,
    },

    // Review events
    ProductReviewed {
        product_id: Uuid,
        review_id: Uuid,
        rating: Decimal,
    },
    ProductReviewRemoved {
        product_id: Uuid,
        review_id: Uuid,
        rating: Decimal,
    },
}

/// Consumes domain events until every sender has been dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id, total, ..
            } => {
                info!(%order_id, %total, "Order created");
            }
            Event::OrderStateChanged { order_id, from, to } => {
                info!(%order_id, %from, %to, "Order state changed");
            }
            Event::UserBanned { user_id } => {
                warn!(%user_id, "User banned");
            }
            Event::ProductReviewed {
                product_id, rating, ..
            }
            | Event::ProductReviewRemoved {
                product_id, rating, ..
            } => {
                info!(%product_id, %rating, "Product rating recomputed");
            }
            other => debug!(event = ?other, "Received event"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_delivers_event() {
        let (sender, mut rx) = EventSender::channel(4);
        let cart_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();

        sender
            .send_or_log(Event::CartItemRemoved {
                cart_id,
                product_id,
            })
            .await;

        assert_eq!(
            rx.recv().await,
            Some(Event::CartItemRemoved {
                cart_id,
                product_id
            })
        );
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);

        sender
            .send_or_log(Event::WishListItemRemoved {
                wish_list_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
            })
            .await;

        assert!(sender.send(Event::CartItemRemoved {
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
        })
        .await
        .is_err());
    }

    #[test]
    fn events_serialize_externally_tagged() {
        let order_id = Uuid::new_v4();
        let json = serde_json::to_value(Event::OrderStateChanged {
            order_id,
            from: OrderState::PreOrder,
            to: OrderState::InTransit,
        })
        .unwrap();

        let body = &json["OrderStateChanged"];
        assert_eq!(body["order_id"], order_id.to_string());
        assert_eq!(body["from"], "PreOrder");
        assert_eq!(body["to"], "InTransit");
    }
}
