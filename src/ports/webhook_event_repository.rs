//! WebhookEventRepository port - log of provider events already reconciled.
//!
//! Providers redeliver on timeouts and 5xx responses. Recording each
//! acknowledged `(provider, event_id)` lets the router answer a redelivery
//! without touching the ledger again. Only acknowledged events are
//! recorded; a failed attempt leaves no row so the redelivery is processed.

use async_trait::async_trait;
use std::fmt;

use crate::domain::billing::Provider;
use crate::domain::foundation::{DomainError, Timestamp};

/// How an acknowledged webhook was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookResult {
    /// Ledger state was written.
    Success,
    /// Nothing to do (unrecognized type, stale snapshot).
    Ignored,
}

impl WebhookResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookResult::Success => "success",
            WebhookResult::Ignored => "ignored",
        }
    }
}

impl fmt::Display for WebhookResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of a processed webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub provider: Provider,

    /// Provider event id (`evt_xxx`, `WH-xxx`).
    pub event_id: String,

    /// Event type as delivered in the envelope.
    pub event_type: String,

    pub result: WebhookResult,

    /// Why the event was ignored.
    pub note: Option<String>,

    pub processed_at: Timestamp,
}

impl WebhookEventRecord {
    /// Creates a new success record.
    pub fn success(
        provider: Provider,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            event_id: event_id.into(),
            event_type: event_type.into(),
            result: WebhookResult::Success,
            note: None,
            processed_at: Timestamp::now(),
        }
    }

    /// Creates a new ignored record.
    pub fn ignored(
        provider: Provider,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            event_id: event_id.into(),
            event_type: event_type.into(),
            result: WebhookResult::Ignored,
            note: Some(reason.into()),
            processed_at: Timestamp::now(),
        }
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (concurrent duplicate finished first).
    AlreadyExists,
}

/// Port for storing and retrieving processed webhook events.
///
/// Implementations rely on a unique `(provider, event_id)` constraint.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Find a previously processed event.
    async fn find(
        &self,
        provider: Provider,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Insert with `ON CONFLICT DO NOTHING` semantics.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Delete records processed before `timestamp`; returns how many.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_record_keeps_reason() {
        let record = WebhookEventRecord::ignored(
            Provider::PayPal,
            "WH-1",
            "CHECKOUT.ORDER.APPROVED",
            "unrecognized event type",
        );

        assert_eq!(record.result, WebhookResult::Ignored);
        assert_eq!(record.note.as_deref(), Some("unrecognized event type"));
    }

    #[test]
    fn success_record_has_no_note() {
        let record = WebhookEventRecord::success(Provider::Stripe, "evt_1", "invoice.paid");

        assert_eq!(record.result.as_str(), "success");
        assert!(record.note.is_none());
    }
}
