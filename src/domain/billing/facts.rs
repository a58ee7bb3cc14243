//! Provider-neutral facts extracted from typed provider events.
//!
//! Provider handlers translate their payloads into these shapes; the
//! reconciler only ever sees facts, never provider JSON.

use serde_json::Value as JsonValue;

use super::invoice::{BillingDetails, LineItem};
use super::provider::Provider;
use super::status::{InvoiceStatus, PaymentStatus, RefundStatus, SubscriptionStatus};
use super::subscription::BillingInterval;
use crate::domain::foundation::{Currency, Timestamp};

/// A payment observed at a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentFact {
    pub provider: Provider,
    pub external_id: String,
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
    /// Set when the payment settles a provider invoice; that invoice is
    /// then authoritative and no local invoice is derived.
    pub provider_invoice_ref: Option<String>,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub occurred_at: Timestamp,
    pub raw: JsonValue,
}

/// One refund observed at a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundFact {
    pub external_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub status: RefundStatus,
    pub reason: Option<String>,
    pub failure_reason: Option<String>,
}

/// How the provider describes the refunded share of the parent payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundCoverage {
    /// Provider states the payment is fully refunded.
    Full,
    /// Provider states the payment is only partially refunded.
    Partial,
    /// Provider reports the cumulative refunded amount.
    ReportedTotal(i64),
    /// Provider says nothing; sum the succeeded refunds on record.
    Derive,
}

/// A refund notification for a payment, carrying one or more refunds.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRefundFact {
    pub provider: Provider,
    pub transaction_ref: Option<String>,
    pub refunds: Vec<RefundFact>,
    pub coverage: RefundCoverage,
    pub occurred_at: Timestamp,
}

/// Which lifecycle notification produced a subscription snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    Created,
    Updated,
    Canceled,
}

/// Full snapshot of a provider subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionFact {
    pub provider: Provider,
    pub external_id: String,
    pub customer_ref: Option<String>,
    pub plan_id: Option<String>,
    pub status: SubscriptionStatus,
    pub amount: Option<i64>,
    pub currency: Option<Currency>,
    pub interval: Option<BillingInterval>,
    pub interval_count: Option<i32>,
    pub quantity: i32,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub trial_start: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub occurred_at: Timestamp,
    pub raw: JsonValue,
}

/// Full snapshot of a provider-issued invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceFact {
    pub provider: Provider,
    pub external_id: String,
    pub number: Option<String>,
    pub customer_ref: Option<String>,
    pub subscription_ref: Option<String>,
    pub transaction_ref: Option<String>,
    pub status: InvoiceStatus,
    pub subtotal: i64,
    pub tax: i64,
    pub discount: Option<i64>,
    pub total: i64,
    pub amount_paid: i64,
    pub currency: Currency,
    pub billing: BillingDetails,
    pub line_items: Vec<LineItem>,
    pub issued_at: Timestamp,
    pub due_at: Option<Timestamp>,
    pub paid_at: Option<Timestamp>,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
    pub occurred_at: Timestamp,
}
