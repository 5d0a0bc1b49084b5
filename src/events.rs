//! Domain events and their dispatch loop.
//!
//! Services send events strictly after their transaction commits. Delivery
//! is fire-and-forget and at-least-once: a send failure is logged, never
//! propagated, so no financial or state change depends on it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::notifications::{Notifier, Recipient, Template};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender/receiver pair with a bounded queue.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the queue is gone.
    /// Used on every post-commit path.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

/// Events emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated(Uuid),
    CartItemsAdded { cart_id: Uuid, count: usize },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },
    CartOfferApplied { cart_id: Uuid, offer_id: Uuid },
    CartOfferRemoved { cart_id: Uuid, offer_id: Uuid },
    CartDeleted(Uuid),

    // Order events
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
    },
    OrderApprovalRequested {
        order_id: Uuid,
        branch_id: Uuid,
        admin_channel: Option<String>,
    },
    OrderStatusChanged {
        order_id: Uuid,
        customer_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Payment events
    PaymentSucceeded { payment_id: Uuid, order_id: Uuid },
    PaymentPending { payment_id: Uuid, order_id: Uuid },
    PaymentFailed { payment_id: Uuid, order_id: Uuid },

    // Promo events
    PromoApplied { order_id: Uuid, promo_code_id: Uuid },
    PromoRemoved { order_id: Uuid, promo_code_id: Uuid },

    // OTP events
    OtpIssued { order_id: Uuid, customer_id: Uuid },
}

/// Processes incoming events, turning the notification-worthy ones into
/// `Notifier` dispatches. Runs until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                customer_id,
            } => {
                dispatch(
                    &notifier,
                    Recipient::Customer(*customer_id),
                    Template::OrderCreated,
                    serde_json::json!({ "order_id": order_id }),
                )
                .await;
            }
            Event::OrderApprovalRequested {
                order_id,
                branch_id,
                admin_channel,
            } => {
                let recipient = match admin_channel {
                    Some(channel) => Recipient::BranchChannel(channel.clone()),
                    None => Recipient::Branch(*branch_id),
                };
                dispatch(
                    &notifier,
                    recipient,
                    Template::OrderApprovalRequested,
                    serde_json::json!({ "order_id": order_id }),
                )
                .await;
            }
            Event::OrderStatusChanged {
                order_id,
                customer_id,
                old_status,
                new_status,
            } => {
                dispatch(
                    &notifier,
                    Recipient::Customer(*customer_id),
                    Template::OrderStatusChanged,
                    serde_json::json!({
                        "order_id": order_id,
                        "from": old_status,
                        "to": new_status,
                    }),
                )
                .await;
            }
            Event::OtpIssued {
                order_id,
                customer_id,
            } => {
                dispatch(
                    &notifier,
                    Recipient::Customer(*customer_id),
                    Template::OtpIssued,
                    serde_json::json!({ "order_id": order_id }),
                )
                .await;
            }
            Event::PaymentFailed { payment_id, .. } => {
                warn!("Payment failed: {}", payment_id);
            }
            other => {
                info!("No notification for event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}

async fn dispatch(
    notifier: &Arc<dyn Notifier>,
    recipient: Recipient,
    template: Template,
    payload: serde_json::Value,
) {
    if let Err(e) = notifier.notify(recipient, template, payload).await {
        // At-least-once, best effort: log and move on.
        error!("Notification dispatch failed: {}", e);
    }
}
