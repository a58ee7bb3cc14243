//! PruneProcessedRecords - retention for deduplication records.
//!
//! Webhook acknowledgements and handler marks only need to outlive the
//! providers' redelivery window; older rows are deleted periodically.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{info, warn};

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ProcessedEventStore, WebhookEventRepository};

/// Rows removed by one pruning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PruneResult {
    pub webhook_events: u64,
    pub handler_marks: u64,
}

pub struct PruneProcessedRecords {
    webhook_events: Arc<dyn WebhookEventRepository>,
    processed_events: Arc<dyn ProcessedEventStore>,
    retention_days: i64,
}

impl PruneProcessedRecords {
    pub fn new(
        webhook_events: Arc<dyn WebhookEventRepository>,
        processed_events: Arc<dyn ProcessedEventStore>,
        retention_days: i64,
    ) -> Self {
        Self {
            webhook_events,
            processed_events,
            retention_days,
        }
    }

    /// Deletes records older than the retention window ending at `now`.
    pub async fn prune(&self, now: Timestamp) -> Result<PruneResult, DomainError> {
        let cutoff = now.add_days(-self.retention_days);
        let result = PruneResult {
            webhook_events: self.webhook_events.delete_before(cutoff).await?,
            handler_marks: self.processed_events.delete_before(cutoff).await?,
        };
        if result != PruneResult::default() {
            info!(
                webhook_events = result.webhook_events,
                handler_marks = result.handler_marks,
                cutoff = %cutoff,
                "Pruned deduplication records"
            );
        }
        Ok(result)
    }

    /// Prunes on every `every` tick until shutdown is signalled.
    pub async fn run(&self, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(every);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.prune(Timestamp::now()).await {
                        warn!(error = %e, "Pruning deduplication records failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryProcessedEventStore, InMemoryWebhookEventRepository};
    use crate::domain::billing::Provider;
    use crate::domain::foundation::EventId;
    use crate::ports::WebhookEventRecord;

    #[tokio::test]
    async fn only_records_past_retention_are_removed() {
        let webhook_events = Arc::new(InMemoryWebhookEventRepository::new());
        let processed = Arc::new(InMemoryProcessedEventStore::new());
        webhook_events
            .save(WebhookEventRecord::success(Provider::Stripe, "evt_1", "invoice.paid"))
            .await
            .unwrap();
        processed
            .mark_processed(&EventId::from_string("e1"), "NotificationFanout")
            .await
            .unwrap();
        let pruner = PruneProcessedRecords::new(webhook_events.clone(), processed, 30);

        let now = pruner.prune(Timestamp::now()).await.unwrap();
        assert_eq!(now, PruneResult::default());

        let later = pruner.prune(Timestamp::now().add_days(31)).await.unwrap();
        assert_eq!(later, PruneResult { webhook_events: 1, handler_marks: 1 });
        assert_eq!(webhook_events.count().await, 0);
    }
}
