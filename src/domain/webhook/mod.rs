//! Webhook domain - the inbound envelope and typed provider events.
//!
//! Raw provider JSON is parsed into closed enums here, before any ledger
//! code runs. Handlers match on `StripeEventKind` / `PayPalEventKind`
//! exhaustively.

mod envelope;
mod errors;
mod outcome;
pub mod paypal;
pub mod stripe;

pub use envelope::WebhookEnvelope;
pub use errors::ReconcileError;
pub use outcome::ReconcileOutcome;
pub use paypal::{PayPalEvent, PayPalEventKind};
pub use stripe::{StripeEvent, StripeEventKind};
