//! Domain events published after ledger facts are recorded.
//!
//! Every event id is derived from the fact it describes, so a replayed or
//! concurrently delivered webhook republishes the same id and idempotent
//! consumers act once.

use serde::{Deserialize, Serialize};

use super::invoice::Invoice;
use super::provider::Provider;
use super::refund::Refund;
use super::status::SubscriptionStatus;
use super::subscription::Subscription;
use super::transaction::Transaction;
use crate::domain::foundation::{
    domain_event, Currency, CustomerId, EventId, InvoiceId, RefundId, SubscriptionId, Timestamp,
    TransactionId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSucceeded {
    pub event_id: EventId,
    pub transaction_id: TransactionId,
    pub customer_id: Option<CustomerId>,
    pub provider: Provider,
    pub external_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub occurred_at: Timestamp,
}

impl PaymentSucceeded {
    pub const TYPE: &'static str = "payment.succeeded.v1";

    pub fn from_transaction(tx: &Transaction, occurred_at: Timestamp) -> Self {
        Self {
            event_id: EventId::for_fact("payment.succeeded", tx.provider, &tx.external_id),
            transaction_id: tx.id,
            customer_id: tx.customer_id,
            provider: tx.provider,
            external_id: tx.external_id.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            occurred_at,
        }
    }
}

domain_event!(
    PaymentSucceeded,
    event_type = PaymentSucceeded::TYPE,
    schema_version = 1,
    aggregate_id = transaction_id,
    aggregate_type = "Transaction",
    occurred_at = occurred_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub event_id: EventId,
    pub transaction_id: TransactionId,
    pub customer_id: Option<CustomerId>,
    pub provider: Provider,
    pub external_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub failure_reason: Option<String>,
    pub occurred_at: Timestamp,
}

impl PaymentFailed {
    pub const TYPE: &'static str = "payment.failed.v1";

    pub fn from_transaction(tx: &Transaction, occurred_at: Timestamp) -> Self {
        Self {
            event_id: EventId::for_fact("payment.failed", tx.provider, &tx.external_id),
            transaction_id: tx.id,
            customer_id: tx.customer_id,
            provider: tx.provider,
            external_id: tx.external_id.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            failure_reason: tx.failure_reason.clone(),
            occurred_at,
        }
    }
}

domain_event!(
    PaymentFailed,
    event_type = PaymentFailed::TYPE,
    schema_version = 1,
    aggregate_id = transaction_id,
    aggregate_type = "Transaction",
    occurred_at = occurred_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionCreated {
    pub event_id: EventId,
    pub subscription_id: SubscriptionId,
    pub customer_id: Option<CustomerId>,
    pub provider: Provider,
    pub external_id: String,
    pub plan_id: Option<String>,
    pub status: SubscriptionStatus,
    pub occurred_at: Timestamp,
}

impl SubscriptionCreated {
    pub const TYPE: &'static str = "subscription.created.v1";

    pub fn from_subscription(sub: &Subscription) -> Self {
        Self {
            event_id: EventId::for_fact("subscription.created", sub.provider, &sub.external_id),
            subscription_id: sub.id,
            customer_id: sub.customer_id,
            provider: sub.provider,
            external_id: sub.external_id.clone(),
            plan_id: sub.plan_id.clone(),
            status: sub.status,
            occurred_at: sub.last_event_at,
        }
    }
}

domain_event!(
    SubscriptionCreated,
    event_type = SubscriptionCreated::TYPE,
    schema_version = 1,
    aggregate_id = subscription_id,
    aggregate_type = "Subscription",
    occurred_at = occurred_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionCanceled {
    pub event_id: EventId,
    pub subscription_id: SubscriptionId,
    pub customer_id: Option<CustomerId>,
    pub provider: Provider,
    pub external_id: String,
    pub canceled_at: Option<Timestamp>,
    pub occurred_at: Timestamp,
}

impl SubscriptionCanceled {
    pub const TYPE: &'static str = "subscription.canceled.v1";

    pub fn from_subscription(sub: &Subscription) -> Self {
        Self {
            event_id: EventId::for_fact("subscription.canceled", sub.provider, &sub.external_id),
            subscription_id: sub.id,
            customer_id: sub.customer_id,
            provider: sub.provider,
            external_id: sub.external_id.clone(),
            canceled_at: sub.canceled_at,
            occurred_at: sub.last_event_at,
        }
    }
}

domain_event!(
    SubscriptionCanceled,
    event_type = SubscriptionCanceled::TYPE,
    schema_version = 1,
    aggregate_id = subscription_id,
    aggregate_type = "Subscription",
    occurred_at = occurred_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundProcessed {
    pub event_id: EventId,
    pub refund_id: RefundId,
    pub transaction_id: Option<TransactionId>,
    pub customer_id: Option<CustomerId>,
    pub provider: Provider,
    pub external_id: String,
    pub amount: i64,
    pub currency: Currency,
    /// Refunds on record exceed the parent payment amount.
    pub over_refunded: bool,
    pub occurred_at: Timestamp,
}

impl RefundProcessed {
    pub const TYPE: &'static str = "refund.processed.v1";

    pub fn from_refund(
        refund: &Refund,
        customer_id: Option<CustomerId>,
        over_refunded: bool,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            event_id: EventId::for_fact("refund.processed", refund.provider, &refund.external_id),
            refund_id: refund.id,
            transaction_id: refund.transaction_id,
            customer_id,
            provider: refund.provider,
            external_id: refund.external_id.clone(),
            amount: refund.amount,
            currency: refund.currency.clone(),
            over_refunded,
            occurred_at,
        }
    }
}

domain_event!(
    RefundProcessed,
    event_type = RefundProcessed::TYPE,
    schema_version = 1,
    aggregate_id = refund_id,
    aggregate_type = "Refund",
    occurred_at = occurred_at,
    event_id = event_id
);

/// An invoice now exists and needs a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub event_id: EventId,
    pub invoice_id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    pub number: String,
    pub total: i64,
    pub currency: Currency,
    pub occurred_at: Timestamp,
}

impl InvoiceIssued {
    pub const TYPE: &'static str = "invoice.issued.v1";

    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            event_id: EventId::from_string(format!("invoice.issued:{}", invoice.id)),
            invoice_id: invoice.id,
            customer_id: invoice.customer_id,
            number: invoice.number.clone(),
            total: invoice.totals.total,
            currency: invoice.currency.clone(),
            occurred_at: invoice.issued_at,
        }
    }
}

domain_event!(
    InvoiceIssued,
    event_type = InvoiceIssued::TYPE,
    schema_version = 1,
    aggregate_id = invoice_id,
    aggregate_type = "Invoice",
    occurred_at = occurred_at,
    event_id = event_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::status::PaymentStatus;
    use crate::domain::billing::transaction::sample_new_transaction;
    use crate::domain::foundation::{DomainEvent, EventEnvelope};

    #[test]
    fn payment_succeeded_id_is_stable_across_replays() {
        let tx = sample_new_transaction("pi_1", PaymentStatus::Succeeded)
            .into_transaction(TransactionId::new(), Timestamp::now());

        let first = PaymentSucceeded::from_transaction(&tx, Timestamp::now());
        let replay = PaymentSucceeded::from_transaction(&tx, Timestamp::now());

        assert_eq!(first.event_id(), replay.event_id());
        assert_eq!(first.event_id().as_str(), "payment.succeeded:stripe:pi_1");
    }

    #[test]
    fn envelope_routes_by_versioned_type() {
        let tx = sample_new_transaction("pi_2", PaymentStatus::Failed)
            .into_transaction(TransactionId::new(), Timestamp::now());
        let event = PaymentFailed::from_transaction(&tx, Timestamp::now());
        let envelope = EventEnvelope::from_event(&event).unwrap();

        assert_eq!(envelope.event_type, "payment.failed.v1");
        assert_eq!(envelope.aggregate_type, "Transaction");
        assert_eq!(envelope.aggregate_id, tx.id.to_string());
    }
}
