//! IdempotentHandler - at-most-once processing per handler and event id.
//!
//! Domain event ids are derived from ledger facts, so a replayed webhook
//! republishes an identical id. Wrapping a consumer in `IdempotentHandler`
//! turns those replays into no-ops.
//!
//! 1. Skip when the store already holds `(event_id, handler name)`
//! 2. Otherwise delegate to the inner handler
//! 3. Mark processed only after the inner handler succeeded
//!
//! A failed inner handler leaves no mark, so the next delivery retries.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{EventHandler, ProcessedEventStore};

/// Decorates an `EventHandler` with processed-event tracking keyed by
/// the handler's `name()`.
pub struct IdempotentHandler<H: EventHandler> {
    inner: H,
    processed_events: Arc<dyn ProcessedEventStore>,
}

impl<H: EventHandler> IdempotentHandler<H> {
    pub fn new(inner: H, processed_events: Arc<dyn ProcessedEventStore>) -> Self {
        Self {
            inner,
            processed_events,
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: EventHandler + 'static> EventHandler for IdempotentHandler<H> {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let handler_name = self.inner.name();

        if self
            .processed_events
            .contains(&envelope.event_id, handler_name)
            .await?
        {
            tracing::debug!(
                event_id = %envelope.event_id,
                handler = handler_name,
                "Skipping already processed event"
            );
            return Ok(());
        }

        self.inner.handle(envelope.clone()).await?;

        self.processed_events
            .mark_processed(&envelope.event_id, handler_name)
            .await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::in_memory::test_support::{envelope, FlakyHandler};
    use crate::adapters::memory::InMemoryProcessedEventStore;

    fn wrap(
        failures: usize,
    ) -> (IdempotentHandler<FlakyHandler>, Arc<InMemoryProcessedEventStore>) {
        let store = Arc::new(InMemoryProcessedEventStore::new());
        (IdempotentHandler::new(FlakyHandler::new(failures), store.clone()), store)
    }

    #[tokio::test]
    async fn replayed_event_reaches_inner_handler_once() {
        let (handler, _) = wrap(0);
        let event = envelope("payment.succeeded.v1", "payment.succeeded:stripe:pi_1");

        handler.handle(event.clone()).await.unwrap();
        handler.handle(event).await.unwrap();

        assert_eq!(handler.inner().calls(), 1);
    }

    #[tokio::test]
    async fn distinct_events_are_all_processed() {
        let (handler, _) = wrap(0);

        handler.handle(envelope("x", "1")).await.unwrap();
        handler.handle(envelope("x", "2")).await.unwrap();

        assert_eq!(handler.inner().calls(), 2);
    }

    #[tokio::test]
    async fn failure_is_not_marked_and_retry_succeeds() {
        let (handler, store) = wrap(1);
        let event = envelope("x", "evt-retry");

        assert!(handler.handle(event.clone()).await.is_err());
        assert!(!store.contains(&event.event_id, "FlakyHandler").await.unwrap());

        handler.handle(event.clone()).await.unwrap();
        assert!(store.contains(&event.event_id, "FlakyHandler").await.unwrap());
        assert_eq!(handler.inner().calls(), 2);
    }

    #[tokio::test]
    async fn name_delegates_to_inner() {
        let (handler, _) = wrap(0);
        assert_eq!(handler.name(), "FlakyHandler");
    }
}
