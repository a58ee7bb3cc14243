//! Application handlers.
//!
//! Command handlers and event consumers that orchestrate domain operations
//! through ports.

pub mod billing;
pub mod order;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_support;

pub use billing::{
    DocumentGenerationHandler, DocumentOutcome, DocumentSweeper, DocumentSweeperConfig,
    InvoicePipeline, NotificationFanout, Reconciler, NOTIFIED_EVENT_TYPES,
};
pub use order::{TransitionOrderCommand, TransitionOrderError, TransitionOrderHandler};
pub use webhook::{
    PayPalEventHandler, ProcessWebhookCommand, ProcessWebhookHandler, PruneProcessedRecords,
    PruneResult, StripeEventHandler,
};
