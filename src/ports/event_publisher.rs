//! EventPublisher port - Interface for publishing domain events.
//!
//! The reconciler publishes after the ledger write has committed; the
//! transport (in-process, channel) is an adapter concern.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events.
///
/// Implementations must ensure:
/// - Events are delivered at-least-once (handlers may receive duplicates)
/// - Publishing never waits on a slow consumer longer than it takes to enqueue
///
/// # Example
///
/// ```ignore
/// let envelope = EventEnvelope::from_event(&PaymentSucceeded::from_transaction(&tx, at))?;
/// publisher.publish(envelope).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish several events in order.
    ///
    /// Stops at the first failure; events already handed over stay published.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}
