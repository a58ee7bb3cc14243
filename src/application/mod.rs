//! Application layer - command handlers and event consumers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    DocumentGenerationHandler, DocumentOutcome, DocumentSweeper, DocumentSweeperConfig,
    InvoicePipeline, NotificationFanout, PayPalEventHandler, ProcessWebhookCommand,
    ProcessWebhookHandler, PruneProcessedRecords, PruneResult, Reconciler, StripeEventHandler,
    TransitionOrderCommand, TransitionOrderError, TransitionOrderHandler, NOTIFIED_EVENT_TYPES,
};
