//! Notification Sink Port - outbound user notifications.
//!
//! The sink is fire-and-forget from the reconciler's point of view: it is
//! only ever called from the notification fan-out consumer, after the
//! ledger write is durable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use thiserror::Error;

use crate::domain::foundation::UserId;

/// Which message to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    PaymentSucceeded,
    PaymentFailed,
    SubscriptionCreated,
    SubscriptionCanceled,
    RefundProcessed,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::PaymentSucceeded => "payment_succeeded",
            NotificationTemplate::PaymentFailed => "payment_failed",
            NotificationTemplate::SubscriptionCreated => "subscription_created",
            NotificationTemplate::SubscriptionCanceled => "subscription_canceled",
            NotificationTemplate::RefundProcessed => "refund_processed",
        }
    }

    /// Subject line used by e-mail sinks.
    pub fn subject(&self) -> &'static str {
        match self {
            NotificationTemplate::PaymentSucceeded => "Payment received",
            NotificationTemplate::PaymentFailed => "Your payment failed",
            NotificationTemplate::SubscriptionCreated => "Your subscription has started",
            NotificationTemplate::SubscriptionCanceled => "Your subscription was canceled",
            NotificationTemplate::RefundProcessed => "Your refund is on its way",
        }
    }
}

impl fmt::Display for NotificationTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from notification delivery.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The recipient cannot be resolved to an address.
    #[error("No address for user {0}")]
    UnknownRecipient(String),

    /// Delivery service rejected the message.
    #[error("Delivery rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Recipient e-mail the fan-out places in a notification context.
pub fn recipient_email(context: &JsonValue) -> Option<&str> {
    context.get("email").and_then(JsonValue::as_str)
}

/// Port for delivering a templated notification to a user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        user_id: &UserId,
        template: NotificationTemplate,
        context: JsonValue,
    ) -> Result<(), NotificationError>;
}
