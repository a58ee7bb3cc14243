//! Webhook handlers.
//!
//! `ProcessWebhookHandler` routes a normalized envelope to the provider
//! handler; the provider handlers turn typed events into facts for the
//! reconciler.

mod paypal_events;
mod process_webhook;
mod prune_processed;
mod stripe_events;

pub use paypal_events::PayPalEventHandler;
pub use process_webhook::{ProcessWebhookCommand, ProcessWebhookHandler};
pub use prune_processed::{PruneProcessedRecords, PruneResult};
pub use stripe_events::StripeEventHandler;
