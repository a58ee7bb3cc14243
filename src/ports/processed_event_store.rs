//! ProcessedEventStore port - Interface for tracking processed events.
//!
//! Domain events carry ids derived from the ledger fact, so a replayed
//! webhook republishes the same id. Consumers record what they have
//! handled here and skip repeats.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventId, Timestamp};

/// Port for tracking which events have been processed by which handlers.
///
/// Each handler has its own processing record, so the notification
/// fan-out and the document generator track the same event independently.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Check if an event has been processed by a specific handler.
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError>;

    /// Mark an event as processed by a specific handler.
    ///
    /// Called only after the handler succeeded, so a failure is retried.
    async fn mark_processed(&self, event_id: &EventId, handler_name: &str)
        -> Result<(), DomainError>;

    /// Delete entries recorded before `timestamp`; returns how many.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
