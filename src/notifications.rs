//! Notification dispatch boundary.
//!
//! The engine reports every order-created and status-change event through a
//! [`Notifier`]. Delivery mechanics (push, SMS, email) live outside this
//! crate; [`TracingNotifier`] is the in-repo stand-in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    Customer(Uuid),
    Branch(Uuid),
    /// Named branch admin channel (approval requests).
    BranchChannel(String),
}

/// Notification template selector; rendering is the delivery side's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Template {
    OrderCreated,
    OrderApprovalRequested,
    OrderStatusChanged,
    OtpIssued,
}

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// At-least-once, unordered notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        recipient: Recipient,
        template: Template,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Logs notifications through `tracing` instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        recipient: Recipient,
        template: Template,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        info!(?recipient, ?template, %payload, "notification dispatched");
        Ok(())
    }
}

/// Captures notifications in memory; used by tests to assert dispatches.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<SentNotification>>,
}

#[derive(Debug, Clone)]
pub struct SentNotification {
    pub recipient: Recipient,
    pub template: Template,
    pub payload: serde_json::Value,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        recipient: Recipient,
        template: Template,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SentNotification {
                recipient,
                template,
                payload,
            });
        Ok(())
    }
}
