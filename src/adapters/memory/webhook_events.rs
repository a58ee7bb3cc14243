//! In-memory webhook event log.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{key, ProviderKey};
use crate::domain::billing::Provider;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

#[derive(Default)]
pub struct InMemoryWebhookEventRepository {
    records: RwLock<HashMap<ProviderKey, WebhookEventRecord>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find(
        &self,
        provider: Provider,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.records.read().await.get(&key(provider, event_id)).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        let k = key(record.provider, &record.event_id);
        if records.contains_key(&k) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(k, record);
        Ok(SaveResult::Inserted)
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.processed_at.is_before(&timestamp));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_event_id_at_different_providers_is_distinct() {
        let repo = InMemoryWebhookEventRepository::new();

        let a = repo
            .save(WebhookEventRecord::success(Provider::Stripe, "evt_1", "invoice.paid"))
            .await
            .unwrap();
        let b = repo
            .save(WebhookEventRecord::success(Provider::PayPal, "evt_1", "X"))
            .await
            .unwrap();
        let dup = repo
            .save(WebhookEventRecord::success(Provider::Stripe, "evt_1", "invoice.paid"))
            .await
            .unwrap();

        assert_eq!(
            (a, b, dup),
            (SaveResult::Inserted, SaveResult::Inserted, SaveResult::AlreadyExists)
        );
        assert_eq!(repo.count().await, 2);
    }
}
