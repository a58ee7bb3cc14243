//! In-memory ledger wiring shared by handler tests.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use super::{
    InvoicePipeline, PayPalEventHandler, ProcessWebhookHandler, Reconciler, StripeEventHandler,
};
use crate::adapters::document::{LocalInvoiceDocumentStorage, MarkdownInvoiceRenderer};
use crate::adapters::events::InMemoryEventBus;
use crate::adapters::memory::{
    InMemoryCustomerRepository, InMemoryInvoiceRepository, InMemoryRefundRepository,
    InMemorySubscriptionRepository, InMemoryTransactionRepository, InMemoryWebhookEventRepository,
};

pub(crate) struct Ledger {
    pub transactions: Arc<InMemoryTransactionRepository>,
    pub subscriptions: Arc<InMemorySubscriptionRepository>,
    pub refunds: Arc<InMemoryRefundRepository>,
    pub invoices: Arc<InMemoryInvoiceRepository>,
    pub customers: Arc<InMemoryCustomerRepository>,
    pub webhook_events: Arc<InMemoryWebhookEventRepository>,
    pub bus: Arc<InMemoryEventBus>,
    pub storage: Arc<LocalInvoiceDocumentStorage>,
    _documents: TempDir,
}

impl Ledger {
    pub fn new() -> Self {
        let documents = TempDir::new().unwrap();
        Self {
            transactions: Arc::new(InMemoryTransactionRepository::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            refunds: Arc::new(InMemoryRefundRepository::new()),
            invoices: Arc::new(InMemoryInvoiceRepository::new()),
            customers: Arc::new(InMemoryCustomerRepository::new()),
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            bus: Arc::new(InMemoryEventBus::new()),
            storage: Arc::new(LocalInvoiceDocumentStorage::new(documents.path())),
            _documents: documents,
        }
    }

    pub fn pipeline(&self) -> Arc<InvoicePipeline> {
        Arc::new(InvoicePipeline::new(
            self.invoices.clone(),
            self.customers.clone(),
            self.storage.clone(),
            Arc::new(MarkdownInvoiceRenderer::new()),
        ))
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.transactions.clone(),
            self.subscriptions.clone(),
            self.refunds.clone(),
            self.invoices.clone(),
            self.customers.clone(),
            self.pipeline(),
            self.bus.clone(),
        )
    }

    pub fn router(&self, processing_budget: Duration) -> ProcessWebhookHandler {
        let reconciler = Arc::new(self.reconciler());
        ProcessWebhookHandler::new(
            self.webhook_events.clone(),
            StripeEventHandler::new(reconciler.clone()),
            PayPalEventHandler::new(reconciler),
            processing_budget,
        )
    }
}
