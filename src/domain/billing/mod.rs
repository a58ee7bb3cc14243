//! Billing domain - the local ledger of provider money movements.
//!
//! # Module Organization
//!
//! - `provider` - Supported payment providers
//! - `status` / `translator` - Unified statuses and provider mappings
//! - `transaction`, `subscription`, `refund`, `invoice`, `customer` - Ledger records
//! - `facts` - Provider-neutral input to the reconciler
//! - `events` - Domain events published after reconciliation

mod customer;
mod events;
mod facts;
mod invoice;
mod provider;
mod refund;
mod status;
mod subscription;
mod transaction;
pub mod translator;

pub use customer::PaymentCustomer;
pub use events::{
    InvoiceIssued, PaymentFailed, PaymentSucceeded, RefundProcessed, SubscriptionCanceled,
    SubscriptionCreated,
};
pub use facts::{
    ChargeRefundFact, InvoiceFact, PaymentFact, RefundCoverage, RefundFact, SubscriptionChange,
    SubscriptionFact,
};
pub use invoice::{Address, BillingDetails, Invoice, InvoiceTotals, LineItem};
pub use provider::Provider;
pub use refund::{NewRefund, Refund};
pub use status::{InvoiceStatus, PaymentStatus, RefundStatus, SubscriptionStatus};
pub use subscription::{BillingInterval, Subscription, SubscriptionSnapshot};
pub use transaction::{NewTransaction, Transaction};
pub use translator::{translate, UnifiedStatus};

#[cfg(test)]
pub(crate) use subscription::sample_snapshot;
#[cfg(test)]
pub(crate) use transaction::sample_new_transaction;
