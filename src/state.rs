//! Application wiring - builds handlers and background workers from config.

use std::sync::Arc;

use tracing::{info, warn};

use crate::adapters::document::{
    HtmlInvoiceRenderer, LocalInvoiceDocumentStorage, MarkdownInvoiceRenderer,
};
use crate::adapters::notification::{LogNotificationSink, ResendNotificationSink};
use crate::adapters::{
    ChannelEventBus, ChannelEventBusConfig, EventDispatcher, IdempotentHandler, LedgerStores,
};
use crate::application::handlers::{
    DocumentGenerationHandler, DocumentSweeper, DocumentSweeperConfig, InvoicePipeline,
    NotificationFanout, PayPalEventHandler, ProcessWebhookHandler, PruneProcessedRecords,
    Reconciler, StripeEventHandler, TransitionOrderHandler, NOTIFIED_EVENT_TYPES,
};
use crate::config::{AppConfig, NotificationSinkKind, RendererKind};
use crate::domain::billing::InvoiceIssued;
use crate::ports::{EventSubscriber, NotificationSink};

/// Handlers and workers sharing one set of stores and one event channel.
pub struct AppServices {
    pub processor: Arc<ProcessWebhookHandler>,
    pub pipeline: Arc<InvoicePipeline>,
    pub orders: Arc<TransitionOrderHandler>,
    pub sweeper: DocumentSweeper,
    pub pruner: PruneProcessedRecords,
    /// Consumer half of the event channel; run it on its own task.
    pub dispatcher: EventDispatcher,
}

impl AppServices {
    pub fn build(stores: &LedgerStores, config: &AppConfig) -> Self {
        let (bus, dispatcher) = ChannelEventBus::new(ChannelEventBusConfig::default());
        let bus = Arc::new(bus);

        let storage = Arc::new(LocalInvoiceDocumentStorage::new(
            config.documents.storage_path.clone(),
        ));
        let mut pipeline = InvoicePipeline::new(
            stores.invoices.clone(),
            stores.customers.clone(),
            storage,
            Arc::new(MarkdownInvoiceRenderer::new()),
        );
        if config.documents.renderer == RendererKind::Html {
            pipeline = pipeline.with_renderer(Arc::new(HtmlInvoiceRenderer::new()));
        }
        let pipeline = Arc::new(pipeline);

        let reconciler = Arc::new(Reconciler::new(
            stores.transactions.clone(),
            stores.subscriptions.clone(),
            stores.refunds.clone(),
            stores.invoices.clone(),
            stores.customers.clone(),
            pipeline.clone(),
            bus.clone(),
        ));

        bus.subscribe(
            InvoiceIssued::TYPE,
            Arc::new(IdempotentHandler::new(
                DocumentGenerationHandler::new(pipeline.clone()),
                stores.processed_events.clone(),
            )),
        );

        if config.notifications.enabled {
            let sink = notification_sink(config);
            bus.subscribe_all(
                &NOTIFIED_EVENT_TYPES,
                Arc::new(IdempotentHandler::new(
                    NotificationFanout::new(stores.customers.clone(), sink),
                    stores.processed_events.clone(),
                )),
            );
        } else {
            info!("Notifications disabled");
        }

        let processor = Arc::new(ProcessWebhookHandler::new(
            stores.webhook_events.clone(),
            StripeEventHandler::new(reconciler.clone()),
            PayPalEventHandler::new(reconciler),
            config.webhooks.processing_budget(),
        ));

        Self {
            processor,
            pipeline: pipeline.clone(),
            orders: Arc::new(TransitionOrderHandler::new(stores.orders.clone())),
            sweeper: DocumentSweeper::new(
                pipeline,
                DocumentSweeperConfig {
                    interval: config.documents.sweep_interval(),
                    batch_size: config.documents.sweep_batch_size,
                },
            ),
            pruner: PruneProcessedRecords::new(
                stores.webhook_events.clone(),
                stores.processed_events.clone(),
                config.webhooks.retention_days,
            ),
            dispatcher,
        }
    }
}

fn notification_sink(config: &AppConfig) -> Arc<dyn NotificationSink> {
    match (config.notifications.sink, &config.email) {
        (NotificationSinkKind::Email, Some(email)) => {
            let mut sink = ResendNotificationSink::new(
                email.resend_api_key.clone(),
                email.from_header(),
            );
            if let Some(url) = &email.api_url {
                sink = sink.with_api_url(url.clone());
            }
            info!(from = %email.from_email, "E-mail notifications enabled");
            Arc::new(sink)
        }
        (NotificationSinkKind::Email, None) => {
            warn!("E-mail sink selected without email settings, logging notifications instead");
            Arc::new(LogNotificationSink::new())
        }
        (NotificationSinkKind::Log, _) => Arc::new(LogNotificationSink::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::ProcessWebhookCommand;
    use crate::config::{DocumentsConfig, NotificationsConfig, ServerConfig, WebhooksConfig};
    use crate::domain::webhook::{ReconcileOutcome, WebhookEnvelope};
    use serde_json::json;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            database: None,
            documents: DocumentsConfig {
                storage_path: dir.path().to_path_buf(),
                ..Default::default()
            },
            notifications: NotificationsConfig::default(),
            email: None,
            webhooks: WebhooksConfig::default(),
        }
    }

    #[tokio::test]
    async fn in_memory_services_process_a_webhook() {
        let dir = TempDir::new().unwrap();
        let services = AppServices::build(&LedgerStores::in_memory(), &config(&dir));

        let envelope = WebhookEnvelope::new(
            "paypal",
            "PAYMENT.CAPTURE.COMPLETED",
            json!({
                "id": "WH-1",
                "create_time": "2026-01-05T10:00:00Z",
                "resource": {
                    "id": "CAP-1",
                    "status": "COMPLETED",
                    "amount": { "value": "12.50", "currency_code": "EUR" }
                }
            }),
        );

        let outcome = services
            .processor
            .handle(ProcessWebhookCommand { envelope })
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Processed);
    }
}
