//! Repository bundle handed to the composition root.

use std::sync::Arc;

use sqlx::PgPool;

use super::memory::{
    InMemoryCustomerRepository, InMemoryInvoiceRepository, InMemoryOrderRepository,
    InMemoryProcessedEventStore, InMemoryRefundRepository, InMemorySubscriptionRepository,
    InMemoryTransactionRepository, InMemoryWebhookEventRepository,
};
use super::postgres::{
    PostgresCustomerRepository, PostgresInvoiceRepository, PostgresOrderRepository,
    PostgresProcessedEventStore, PostgresRefundRepository, PostgresSubscriptionRepository,
    PostgresTransactionRepository, PostgresWebhookEventRepository,
};
use crate::ports::{
    CustomerRepository, InvoiceRepository, OrderRepository, ProcessedEventStore,
    RefundRepository, SubscriptionRepository, TransactionRepository, WebhookEventRepository,
};

/// Every ledger repository, behind its port.
#[derive(Clone)]
pub struct LedgerStores {
    pub transactions: Arc<dyn TransactionRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub refunds: Arc<dyn RefundRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub processed_events: Arc<dyn ProcessedEventStore>,
}

impl LedgerStores {
    /// Process-local stores; state is lost on restart.
    pub fn in_memory() -> Self {
        Self {
            transactions: Arc::new(InMemoryTransactionRepository::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            refunds: Arc::new(InMemoryRefundRepository::new()),
            invoices: Arc::new(InMemoryInvoiceRepository::new()),
            customers: Arc::new(InMemoryCustomerRepository::new()),
            orders: Arc::new(InMemoryOrderRepository::new()),
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            processed_events: Arc::new(InMemoryProcessedEventStore::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            transactions: Arc::new(PostgresTransactionRepository::new(pool.clone())),
            subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
            refunds: Arc::new(PostgresRefundRepository::new(pool.clone())),
            invoices: Arc::new(PostgresInvoiceRepository::new(pool.clone())),
            customers: Arc::new(PostgresCustomerRepository::new(pool.clone())),
            orders: Arc::new(PostgresOrderRepository::new(pool.clone())),
            webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool.clone())),
            processed_events: Arc::new(PostgresProcessedEventStore::new(pool)),
        }
    }
}
