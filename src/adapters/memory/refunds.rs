//! In-memory refund ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{key, ProviderKey};
use crate::domain::billing::{NewRefund, Provider, Refund, RefundStatus};
use crate::domain::foundation::{DomainError, RefundId, Timestamp, TransactionId};
use crate::ports::{RefundRepository, Upserted};

#[derive(Default)]
pub struct InMemoryRefundRepository {
    rows: RwLock<HashMap<ProviderKey, Refund>>,
}

impl InMemoryRefundRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn for_transaction(&self, id: &TransactionId) -> Vec<Refund> {
        self.rows
            .read()
            .await
            .values()
            .filter(|r| r.transaction_id.as_ref() == Some(id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RefundRepository for InMemoryRefundRepository {
    async fn upsert(
        &self,
        refund: &NewRefund,
    ) -> Result<Upserted<Refund, RefundStatus>, DomainError> {
        let now = Timestamp::now();
        let mut rows = self.rows.write().await;
        match rows.get_mut(&key(refund.provider, &refund.external_id)) {
            Some(existing) => {
                let previous = existing.status;
                existing.apply(refund.clone(), now);
                Ok(Upserted::updated(existing.clone(), previous))
            }
            None => {
                let created = refund.clone().into_refund(RefundId::new(), now);
                rows.insert(key(refund.provider, &refund.external_id), created.clone());
                Ok(Upserted::created(created))
            }
        }
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Refund>, DomainError> {
        Ok(self.rows.read().await.get(&key(provider, external_id)).cloned())
    }

    async fn link_orphans(
        &self,
        provider: Provider,
        transaction_ref: &str,
        transaction_id: &TransactionId,
    ) -> Result<u64, DomainError> {
        let now = Timestamp::now();
        let mut linked = 0;
        for refund in self.rows.write().await.values_mut() {
            if refund.provider == provider
                && refund.transaction_id.is_none()
                && refund.transaction_ref.as_deref() == Some(transaction_ref)
            {
                refund.transaction_id = Some(*transaction_id);
                refund.updated_at = now;
                linked += 1;
            }
        }
        Ok(linked)
    }

    async fn sum_succeeded_for_transaction(&self, id: &TransactionId) -> Result<i64, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|r| {
                r.transaction_id.as_ref() == Some(id) && r.status == RefundStatus::Succeeded
            })
            .map(|r| r.amount)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Currency;

    fn refund(
        external_id: &str,
        tx: TransactionId,
        amount: i64,
        status: RefundStatus,
    ) -> NewRefund {
        NewRefund {
            provider: Provider::Stripe,
            external_id: external_id.to_string(),
            transaction_id: Some(tx),
            transaction_ref: None,
            amount,
            currency: Currency::new("usd").unwrap(),
            status,
            reason: None,
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn sum_counts_only_succeeded_refunds_of_the_transaction() {
        let repo = InMemoryRefundRepository::new();
        let tx = TransactionId::new();

        repo.upsert(&refund("re_1", tx, 500, RefundStatus::Succeeded)).await.unwrap();
        repo.upsert(&refund("re_2", tx, 300, RefundStatus::Pending)).await.unwrap();
        repo.upsert(&refund("re_3", TransactionId::new(), 900, RefundStatus::Succeeded))
            .await
            .unwrap();

        assert_eq!(repo.sum_succeeded_for_transaction(&tx).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn replayed_refund_is_updated_in_place() {
        let repo = InMemoryRefundRepository::new();
        let tx = TransactionId::new();

        repo.upsert(&refund("re_1", tx, 500, RefundStatus::Pending)).await.unwrap();
        let replay = repo.upsert(&refund("re_1", tx, 500, RefundStatus::Succeeded)).await.unwrap();

        assert!(!replay.was_created);
        assert_eq!(replay.previous_status, Some(RefundStatus::Pending));
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn orphans_are_linked_by_provider_reference() {
        let repo = InMemoryRefundRepository::new();
        let tx = TransactionId::new();
        let orphan = |id: &str, parent: &str| NewRefund {
            transaction_id: None,
            transaction_ref: Some(parent.to_string()),
            ..refund(id, tx, 400, RefundStatus::Succeeded)
        };
        repo.upsert(&orphan("re_1", "pi_1")).await.unwrap();
        repo.upsert(&orphan("re_2", "pi_1")).await.unwrap();
        repo.upsert(&orphan("re_3", "pi_2")).await.unwrap();

        let linked = repo.link_orphans(Provider::Stripe, "pi_1", &tx).await.unwrap();

        assert_eq!(linked, 2);
        assert_eq!(repo.sum_succeeded_for_transaction(&tx).await.unwrap(), 800);
        assert_eq!(repo.link_orphans(Provider::Stripe, "pi_1", &tx).await.unwrap(), 0);
    }
}
