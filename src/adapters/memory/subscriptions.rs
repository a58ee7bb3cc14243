//! In-memory subscription store with the stale-snapshot guard.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{key, ProviderKey};
use crate::domain::billing::{Provider, Subscription, SubscriptionSnapshot};
use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};
use crate::ports::{SnapshotApplied, SubscriptionRepository, Upserted};

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    rows: RwLock<HashMap<ProviderKey, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn upsert_snapshot(
        &self,
        snapshot: &SubscriptionSnapshot,
    ) -> Result<SnapshotApplied, DomainError> {
        let now = Timestamp::now();
        let mut rows = self.rows.write().await;
        match rows.get_mut(&key(snapshot.provider, &snapshot.external_id)) {
            Some(existing) if !existing.accepts(snapshot) => {
                Ok(SnapshotApplied::Stale(existing.clone()))
            }
            Some(existing) => {
                let previous = existing.status;
                existing.replace_with(snapshot.clone(), now);
                Ok(SnapshotApplied::Applied(Upserted::updated(existing.clone(), previous)))
            }
            None => {
                let created = snapshot.clone().into_subscription(SubscriptionId::new(), now);
                rows.insert(key(snapshot.provider, &snapshot.external_id), created.clone());
                Ok(SnapshotApplied::Applied(Upserted::created(created)))
            }
        }
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.rows.read().await.values().find(|s| s.id == *id).cloned())
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.rows.read().await.get(&key(provider, external_id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{sample_snapshot, SubscriptionStatus};

    #[tokio::test]
    async fn older_snapshot_is_reported_stale() {
        let repo = InMemorySubscriptionRepository::new();
        let t1 = Timestamp::from_unix_secs(2_000).unwrap();
        let t0 = Timestamp::from_unix_secs(1_000).unwrap();

        repo.upsert_snapshot(&sample_snapshot("sub_1", SubscriptionStatus::Canceled, t1))
            .await
            .unwrap();
        let late = repo
            .upsert_snapshot(&sample_snapshot("sub_1", SubscriptionStatus::Active, t0))
            .await
            .unwrap();

        let SnapshotApplied::Stale(stored) = late else {
            panic!("expected stale");
        };
        assert_eq!(stored.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn equal_timestamp_replay_applies() {
        let repo = InMemorySubscriptionRepository::new();
        let t = Timestamp::from_unix_secs(2_000).unwrap();
        let snapshot = sample_snapshot("sub_1", SubscriptionStatus::Active, t);

        repo.upsert_snapshot(&snapshot).await.unwrap();
        let replay = repo.upsert_snapshot(&snapshot).await.unwrap();

        assert!(matches!(replay, SnapshotApplied::Applied(ref u) if !u.was_created));
        assert_eq!(repo.count().await, 1);
    }
}
