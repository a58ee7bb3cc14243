//! Subscription repository port.

use async_trait::async_trait;

use super::Upserted;
use crate::domain::billing::{Provider, Subscription, SubscriptionSnapshot, SubscriptionStatus};
use crate::domain::foundation::{DomainError, SubscriptionId};

/// Result of applying a provider snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotApplied {
    /// The snapshot replaced (or created) the row.
    Applied(Upserted<Subscription, SubscriptionStatus>),
    /// The stored row carries a newer provider timestamp; nothing written.
    Stale(Subscription),
}

/// Latest-snapshot store for provider subscriptions.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Replaces the row for the snapshot's key unless it is older than
    /// the stored `last_event_at`. The comparison happens in the same
    /// statement as the write.
    async fn upsert_snapshot(
        &self,
        snapshot: &SubscriptionSnapshot,
    ) -> Result<SnapshotApplied, DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;
}
