//! DocumentSweeper - background safety net for invoice documents.
//!
//! Document jobs ride the in-process event channel, so a crash or an
//! exhausted retry loses them. The sweeper periodically generates whatever
//! is still missing.
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 60s | Time between sweeps |
//! | `batch_size` | 50 | Max invoices per sweep |

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{info, warn};

use super::InvoicePipeline;
use crate::domain::foundation::DomainError;

#[derive(Debug, Clone)]
pub struct DocumentSweeperConfig {
    pub interval: Duration,
    pub batch_size: u32,
}

impl Default for DocumentSweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 50,
        }
    }
}

pub struct DocumentSweeper {
    pipeline: Arc<InvoicePipeline>,
    config: DocumentSweeperConfig,
}

impl DocumentSweeper {
    pub fn new(pipeline: Arc<InvoicePipeline>, config: DocumentSweeperConfig) -> Self {
        Self { pipeline, config }
    }

    /// Sweeps on every tick until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Document sweeper stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "Document sweep failed");
                    }
                }
            }
        }
    }

    /// Runs a single sweep and returns the number of documents generated.
    pub async fn sweep_once(&self) -> Result<usize, DomainError> {
        let generated = self
            .pipeline
            .generate_missing_documents(self.config.batch_size)
            .await?;
        if generated > 0 {
            info!(generated, "Generated missing invoice documents");
        }
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::Ledger;
    use crate::domain::billing::{sample_new_transaction, PaymentStatus};
    use crate::domain::foundation::{Timestamp, TransactionId};

    #[tokio::test]
    async fn sweep_fills_missing_documents() {
        let ledger = Ledger::new();
        let pipeline = ledger.pipeline();
        for id in ["pi_1", "pi_2"] {
            let tx = sample_new_transaction(id, PaymentStatus::Succeeded)
                .into_transaction(TransactionId::new(), Timestamp::now());
            pipeline.create_from_transaction(&tx).await.unwrap();
        }

        let sweeper = DocumentSweeper::new(pipeline, DocumentSweeperConfig::default());

        assert_eq!(sweeper.sweep_once().await.unwrap(), 2);
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn run_returns_on_shutdown() {
        let ledger = Ledger::new();
        let sweeper = DocumentSweeper::new(
            ledger.pipeline(),
            DocumentSweeperConfig {
                interval: Duration::from_millis(10),
                batch_size: 10,
            },
        );
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move { sweeper.run(rx).await });
        tx.send(true).unwrap();

        time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
