//! In-memory event bus that delivers synchronously inside `publish`.
//!
//! Used by tests and by the local development profile. Handler errors are
//! collected and returned to the publisher, which logs them; nothing is
//! retried.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

/// Synchronous, capturing event bus.
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// bus.publish(envelope).await?;
/// assert!(bus.has_event(PaymentSucceeded::TYPE));
/// ```
#[derive(Default)]
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    published: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far, in order.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.event_type == event_type)
    }

    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        self.published
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());

        // Lock is released before any handler runs.
        let mut errors = Vec::new();
        for handler in self.handlers_for(&event.event_type) {
            if let Err(e) = handler.handle(event.clone()).await {
                errors.push(format!("{}: {}", handler.name(), e));
            }
        }

        if !errors.is_empty() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Handler errors: {}", errors.join(", ")),
            ));
        }
        Ok(())
    }

    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.subscribe_all(&[event_type], handler);
    }

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        for event_type in event_types {
            handlers
                .entry(event_type.to_string())
                .or_default()
                .push(Arc::clone(&handler));
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::foundation::{EventId, EventMetadata, Timestamp};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn envelope(event_type: &str, event_id: &str) -> EventEnvelope {
        EventEnvelope {
            event_id: EventId::from_string(event_id),
            event_type: event_type.to_string(),
            schema_version: 1,
            aggregate_id: "agg-1".to_string(),
            aggregate_type: "Test".to_string(),
            occurred_at: Timestamp::now(),
            payload: serde_json::json!({}),
            metadata: EventMetadata::default(),
        }
    }

    /// Counts calls and fails the first `failures` of them.
    pub(crate) struct FlakyHandler {
        pub calls: AtomicUsize,
        pub failures: usize,
    }

    impl FlakyHandler {
        pub(crate) fn new(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for FlakyHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(DomainError::new(ErrorCode::DeliveryFailed, "transient"))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "FlakyHandler"
        }
    }
}
