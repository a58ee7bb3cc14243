//! In-memory adapters for tests and local development.
//!
//! Each repository keeps its rows behind a `tokio::sync::RwLock` and
//! enforces the same unique keys as the Postgres schema. Upserts hold the
//! write lock for the whole find-or-insert, which stands in for the
//! storage-level constraint.

mod customers;
mod invoices;
mod orders;
mod processed_events;
mod refunds;
mod subscriptions;
mod transactions;
mod webhook_events;

pub use customers::InMemoryCustomerRepository;
pub use invoices::InMemoryInvoiceRepository;
pub use orders::InMemoryOrderRepository;
pub use processed_events::InMemoryProcessedEventStore;
pub use refunds::InMemoryRefundRepository;
pub use subscriptions::InMemorySubscriptionRepository;
pub use transactions::InMemoryTransactionRepository;
pub use webhook_events::InMemoryWebhookEventRepository;

use crate::domain::billing::Provider;

type ProviderKey = (Provider, String);

fn key(provider: Provider, external_id: &str) -> ProviderKey {
    (provider, external_id.to_string())
}
