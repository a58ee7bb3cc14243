//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, errors and event plumbing that
//! form the vocabulary of the reconciliation domain.

mod errors;
mod events;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{CustomerId, InvoiceId, OrderId, RefundId, SubscriptionId, TransactionId, UserId};
pub use money::Currency;
pub use state_machine::{InvalidStateTransition, StateMachine};
pub use timestamp::Timestamp;
