//! Transaction - one money movement observed at a provider.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::provider::Provider;
use super::status::PaymentStatus;
use crate::domain::foundation::{Currency, CustomerId, SubscriptionId, Timestamp, TransactionId};

/// Ledger row for a provider payment, unique per `(provider, external_id)`.
///
/// Transactions are never deleted. The only status rule beyond
/// last-write-wins is that `refunded` is sticky against replays of the
/// original success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: Option<CustomerId>,
    pub subscription_id: Option<SubscriptionId>,
    pub provider: Provider,
    pub external_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub raw_response: JsonValue,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Attributes written by a transaction upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub provider: Provider,
    pub external_id: String,
    pub customer_id: Option<CustomerId>,
    pub subscription_id: Option<SubscriptionId>,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub raw_response: JsonValue,
}

impl NewTransaction {
    /// Materializes a brand new row.
    pub fn into_transaction(self, id: TransactionId, now: Timestamp) -> Transaction {
        Transaction {
            id,
            customer_id: self.customer_id,
            subscription_id: self.subscription_id,
            provider: self.provider,
            external_id: self.external_id,
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            payment_method: self.payment_method,
            description: self.description,
            failure_reason: self.failure_reason,
            raw_response: self.raw_response,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Transaction {
    /// Applies a later observation of the same payment.
    ///
    /// Scalar attributes are overwritten; linkage and descriptive fields
    /// are only replaced when the update carries a value.
    pub fn apply(&mut self, update: NewTransaction, now: Timestamp) {
        self.status = self.status.reconcile(update.status);
        self.amount = update.amount;
        self.currency = update.currency;
        self.customer_id = update.customer_id.or(self.customer_id);
        self.subscription_id = update.subscription_id.or(self.subscription_id);
        self.payment_method = update.payment_method.or_else(|| self.payment_method.take());
        self.description = update.description.or_else(|| self.description.take());
        self.failure_reason = update.failure_reason;
        self.raw_response = update.raw_response;
        self.updated_at = now;
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }
}

#[cfg(test)]
pub(crate) fn sample_new_transaction(external_id: &str, status: PaymentStatus) -> NewTransaction {
    NewTransaction {
        provider: Provider::Stripe,
        external_id: external_id.to_string(),
        customer_id: None,
        subscription_id: None,
        amount: 2000,
        currency: Currency::new("usd").unwrap(),
        status,
        payment_method: Some("card".to_string()),
        description: None,
        failure_reason: None,
        raw_response: serde_json::json!({ "id": external_id }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_keeps_refunded_status_on_replay() {
        let now = Timestamp::now();
        let mut tx = sample_new_transaction("pi_1", PaymentStatus::Refunded)
            .into_transaction(TransactionId::new(), now);

        tx.apply(sample_new_transaction("pi_1", PaymentStatus::Succeeded), now);

        assert_eq!(tx.status, PaymentStatus::Refunded);
    }

    #[test]
    fn apply_preserves_linkage_when_update_lacks_it() {
        let now = Timestamp::now();
        let customer = CustomerId::new();
        let mut first = sample_new_transaction("pi_1", PaymentStatus::Pending);
        first.customer_id = Some(customer);
        let mut tx = first.into_transaction(TransactionId::new(), now);

        let mut update = sample_new_transaction("pi_1", PaymentStatus::Succeeded);
        update.payment_method = None;
        tx.apply(update, now);

        assert_eq!(tx.customer_id, Some(customer));
        assert_eq!(tx.payment_method.as_deref(), Some("card"));
        assert!(tx.is_succeeded());
    }

    #[test]
    fn apply_clears_failure_reason_after_success() {
        let now = Timestamp::now();
        let mut failed = sample_new_transaction("pi_1", PaymentStatus::Failed);
        failed.failure_reason = Some("card_declined".to_string());
        let mut tx = failed.into_transaction(TransactionId::new(), now);

        tx.apply(sample_new_transaction("pi_1", PaymentStatus::Succeeded), now);

        assert_eq!(tx.failure_reason, None);
    }
}
