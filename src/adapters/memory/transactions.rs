//! In-memory transaction ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::{key, ProviderKey};
use crate::domain::billing::{NewTransaction, PaymentStatus, Provider, Transaction};
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp, TransactionId};
use crate::ports::{TransactionRepository, Upserted};

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    rows: RwLock<HashMap<ProviderKey, Transaction>>,
    injected_conflicts: AtomicUsize,
    upsert_delay_ms: AtomicU64,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` upserts fail with a unique violation, as a
    /// racing writer on Postgres would.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Slows every upsert down by `delay`.
    pub fn delay_upserts(&self, delay: Duration) {
        self.upsert_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn all(&self) -> Vec<Transaction> {
        self.rows.read().await.values().cloned().collect()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn upsert(
        &self,
        tx: &NewTransaction,
    ) -> Result<Upserted<Transaction, PaymentStatus>, DomainError> {
        let delay_ms = self.upsert_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.take_injected_conflict() {
            return Err(DomainError::unique_violation(
                "Transaction",
                format!("{}:{}", tx.provider, tx.external_id),
            ));
        }

        let now = Timestamp::now();
        let mut rows = self.rows.write().await;
        match rows.get_mut(&key(tx.provider, &tx.external_id)) {
            Some(existing) => {
                let previous = existing.status;
                existing.apply(tx.clone(), now);
                Ok(Upserted::updated(existing.clone(), previous))
            }
            None => {
                let created = tx.clone().into_transaction(TransactionId::new(), now);
                rows.insert(key(tx.provider, &tx.external_id), created.clone());
                Ok(Upserted::created(created))
            }
        }
    }

    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, DomainError> {
        Ok(self.rows.read().await.values().find(|t| t.id == *id).cloned())
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Transaction>, DomainError> {
        Ok(self.rows.read().await.get(&key(provider, external_id)).cloned())
    }

    async fn mark_refunded(&self, id: &TransactionId) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        match rows.values_mut().find(|t| t.id == *id) {
            Some(tx) if tx.status != PaymentStatus::Refunded => {
                tx.status = PaymentStatus::Refunded;
                tx.updated_at = Timestamp::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn link_subscription(
        &self,
        id: &TransactionId,
        subscription_id: &SubscriptionId,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        match rows.values_mut().find(|t| t.id == *id) {
            Some(tx) if tx.subscription_id.is_none() => {
                tx.subscription_id = Some(*subscription_id);
                tx.updated_at = Timestamp::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::sample_new_transaction;

    #[tokio::test]
    async fn second_upsert_updates_same_row() {
        let repo = InMemoryTransactionRepository::new();

        let first = repo
            .upsert(&sample_new_transaction("pi_1", PaymentStatus::Pending))
            .await
            .unwrap();
        let second = repo
            .upsert(&sample_new_transaction("pi_1", PaymentStatus::Succeeded))
            .await
            .unwrap();

        assert!(first.was_created);
        assert!(!second.was_created);
        assert_eq!(second.previous_status, Some(PaymentStatus::Pending));
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn refunded_row_survives_replayed_success() {
        let repo = InMemoryTransactionRepository::new();
        let created = repo
            .upsert(&sample_new_transaction("pi_1", PaymentStatus::Succeeded))
            .await
            .unwrap();

        assert!(repo.mark_refunded(&created.record.id).await.unwrap());
        assert!(!repo.mark_refunded(&created.record.id).await.unwrap());

        let replay = repo
            .upsert(&sample_new_transaction("pi_1", PaymentStatus::Succeeded))
            .await
            .unwrap();
        assert_eq!(replay.record.status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn injected_conflict_fails_once() {
        let repo = InMemoryTransactionRepository::new();
        repo.inject_conflicts(1);
        let new_tx = sample_new_transaction("pi_1", PaymentStatus::Succeeded);

        assert!(repo.upsert(&new_tx).await.unwrap_err().is_unique_violation());
        assert!(repo.upsert(&new_tx).await.is_ok());
    }

    #[tokio::test]
    async fn subscription_link_never_overwrites() {
        let repo = InMemoryTransactionRepository::new();
        let created = repo
            .upsert(&sample_new_transaction("pi_1", PaymentStatus::Succeeded))
            .await
            .unwrap();
        let first = SubscriptionId::new();

        assert!(repo.link_subscription(&created.record.id, &first).await.unwrap());
        assert!(!repo.link_subscription(&created.record.id, &SubscriptionId::new()).await.unwrap());

        let stored = repo.find_by_id(&created.record.id).await.unwrap().unwrap();
        assert_eq!(stored.subscription_id, Some(first));
    }
}
