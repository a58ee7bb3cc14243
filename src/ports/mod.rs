//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Ledger Ports
//!
//! - `TransactionRepository`, `SubscriptionRepository`, `RefundRepository` -
//!   idempotent `(provider, external_id)` upserts
//! - `InvoiceRepository` - derived and provider invoices, document compare-and-set
//! - `CustomerRepository`, `OrderRepository`
//!
//! ## Event Ports
//!
//! - `EventPublisher` / `EventSubscriber` / `EventHandler` - domain event transport
//! - `ProcessedEventStore` - idempotency tracking for event handlers
//! - `WebhookEventRepository` - provider webhook deduplication
//!
//! ## Collaborator Ports
//!
//! - `InvoiceRenderer`, `InvoiceDocumentStorage` - document pipeline
//! - `NotificationSink` - user notifications

mod customer_repository;
mod event_publisher;
mod event_subscriber;
mod invoice_document_storage;
mod invoice_renderer;
mod invoice_repository;
mod notification_sink;
mod order_repository;
mod processed_event_store;
mod refund_repository;
mod subscription_repository;
mod transaction_repository;
mod upsert;
mod webhook_event_repository;

pub use customer_repository::CustomerRepository;
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use invoice_document_storage::{InvoiceDocumentStorage, StorageError, StoredDocument};
pub use invoice_renderer::{
    DocumentFormat, DocumentLine, InvoiceDocumentData, InvoiceRenderer, RenderError,
    RenderedDocument,
};
pub use invoice_repository::InvoiceRepository;
pub use notification_sink::{
    recipient_email, NotificationError, NotificationSink, NotificationTemplate,
};
pub use order_repository::OrderRepository;
pub use processed_event_store::ProcessedEventStore;
pub use refund_repository::RefundRepository;
pub use subscription_repository::{SnapshotApplied, SubscriptionRepository};
pub use transaction_repository::TransactionRepository;
pub use upsert::Upserted;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult,
};
