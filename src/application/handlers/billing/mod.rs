//! Billing handlers.
//!
//! - `Reconciler` - applies provider facts to the ledger
//! - `InvoicePipeline` - invoice derivation and document generation
//! - `DocumentGenerationHandler`, `NotificationFanout` - event channel consumers
//! - `DocumentSweeper` - background retry for missing documents

mod document_generation_handler;
mod document_sweeper;
mod invoice_pipeline;
mod notification_fanout;
mod reconciler;

pub use document_generation_handler::DocumentGenerationHandler;
pub use document_sweeper::{DocumentSweeper, DocumentSweeperConfig};
pub use invoice_pipeline::{DocumentOutcome, InvoicePipeline};
pub use notification_fanout::{NotificationFanout, NOTIFIED_EVENT_TYPES};
pub use reconciler::Reconciler;
