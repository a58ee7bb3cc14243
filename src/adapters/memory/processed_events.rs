//! In-memory processed-event store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    processed: RwLock<HashMap<(String, String), Timestamp>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        let key = (event_id.as_str().to_string(), handler_name.to_string());
        Ok(self.processed.read().await.contains_key(&key))
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<(), DomainError> {
        let key = (event_id.as_str().to_string(), handler_name.to_string());
        self.processed
            .write()
            .await
            .entry(key)
            .or_insert_with(Timestamp::now);
        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut processed = self.processed.write().await;
        let before = processed.len();
        processed.retain(|_, at| !at.is_before(&timestamp));
        Ok((before - processed.len()) as u64)
    }
}
