//! Refund - money returned against a transaction.

use serde::{Deserialize, Serialize};

use super::provider::Provider;
use super::status::RefundStatus;
use crate::domain::foundation::{Currency, RefundId, Timestamp, TransactionId};

/// Ledger row for a provider refund, unique per `(provider, external_id)`.
///
/// `transaction_id` is null when the refund arrived before (or without)
/// its parent payment; `transaction_ref` keeps the provider's payment id so
/// the row can be linked once that payment is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub transaction_id: Option<TransactionId>,
    pub transaction_ref: Option<String>,
    pub provider: Provider,
    pub external_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub status: RefundStatus,
    pub reason: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Attributes written by a refund upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRefund {
    pub provider: Provider,
    pub external_id: String,
    pub transaction_id: Option<TransactionId>,
    pub transaction_ref: Option<String>,
    pub amount: i64,
    pub currency: Currency,
    pub status: RefundStatus,
    pub reason: Option<String>,
    pub failure_reason: Option<String>,
}

impl NewRefund {
    pub fn into_refund(self, id: RefundId, now: Timestamp) -> Refund {
        Refund {
            id,
            transaction_id: self.transaction_id,
            transaction_ref: self.transaction_ref,
            provider: self.provider,
            external_id: self.external_id,
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            reason: self.reason,
            failure_reason: self.failure_reason,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Refund {
    /// Applies a later observation of the same refund.
    pub fn apply(&mut self, update: NewRefund, now: Timestamp) {
        self.transaction_id = update.transaction_id.or(self.transaction_id);
        self.transaction_ref = update.transaction_ref.or_else(|| self.transaction_ref.take());
        self.amount = update.amount;
        self.currency = update.currency;
        self.status = update.status;
        self.reason = update.reason.or_else(|| self.reason.take());
        self.failure_reason = update.failure_reason;
        self.updated_at = now;
    }
}
