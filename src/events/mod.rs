use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(error) = self.send(event).await {
            warn!(%error, "domain event dropped");
        }
    }
}

/// Domain events emitted by the storefront services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    UserRegistered(Uuid),
    UserBanned(Uuid),
    UserUnbanned(Uuid),
    UserDeleted(Uuid),
    PasswordResetRequested(Uuid),
    PasswordChanged(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),
    CategoryCreated(Uuid),
    CategoryDeleted(Uuid),
    OrderCreated { order_id: Uuid, user_id: Uuid },
    OrderDeleted(Uuid),
    CheckoutSessionCreated { order_id: Uuid, session_id: String },
    PaymentSucceeded(Uuid),
    PaymentFailed(Uuid),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserRegistered(_) => "user.registered",
            Event::UserBanned(_) => "user.banned",
            Event::UserUnbanned(_) => "user.unbanned",
            Event::UserDeleted(_) => "user.deleted",
            Event::PasswordResetRequested(_) => "user.password_reset_requested",
            Event::PasswordChanged(_) => "user.password_changed",
            Event::ProductCreated(_) => "product.created",
            Event::ProductUpdated(_) => "product.updated",
            Event::ProductDeleted(_) => "product.deleted",
            Event::CategoryCreated(_) => "category.created",
            Event::CategoryDeleted(_) => "category.deleted",
            Event::OrderCreated { .. } => "order.created",
            Event::OrderDeleted(_) => "order.deleted",
            Event::CheckoutSessionCreated { .. } => "checkout.session_created",
            Event::PaymentSucceeded(_) => "payment.succeeded",
            Event::PaymentFailed(_) => "payment.failed",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated { order_id, user_id } => {
                info!(event = event.name(), %order_id, %user_id, "domain event");
            }
            Event::CheckoutSessionCreated {
                order_id,
                session_id,
            } => {
                info!(event = event.name(), %order_id, %session_id, "domain event");
            }
            Event::PaymentSucceeded(order_id)
            | Event::PaymentFailed(order_id)
            | Event::OrderDeleted(order_id) => {
                info!(event = event.name(), %order_id, "domain event");
            }
            Event::ProductCreated(id)
            | Event::ProductUpdated(id)
            | Event::ProductDeleted(id)
            | Event::CategoryCreated(id)
            | Event::CategoryDeleted(id) => {
                debug!(event = event.name(), %id, "domain event");
            }
            Event::UserRegistered(user_id)
            | Event::UserBanned(user_id)
            | Event::UserUnbanned(user_id)
            | Event::UserDeleted(user_id)
            | Event::PasswordResetRequested(user_id)
            | Event::PasswordChanged(user_id) => {
                info!(event = event.name(), %user_id, "domain event");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();

        sender.send(Event::PaymentSucceeded(order_id)).await.unwrap();
        assert_eq!(rx.recv().await, Some(Event::PaymentSucceeded(order_id)));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::UserBanned(Uuid::new_v4())).await.is_err());
        sender.send_or_log(Event::UserBanned(Uuid::new_v4())).await;
    }
}
