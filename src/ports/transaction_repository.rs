//! Transaction repository port.

use async_trait::async_trait;

use super::Upserted;
use crate::domain::billing::{NewTransaction, PaymentStatus, Provider, Transaction};
use crate::domain::foundation::{DomainError, SubscriptionId, TransactionId};

/// Ledger of provider payments, unique per `(provider, external_id)`.
///
/// Implementations must back the key with a storage-level unique
/// constraint; check-then-insert alone is not acceptable.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Inserts or updates the row for `tx.provider, tx.external_id`.
    ///
    /// Updates follow `Transaction::apply`: linkage is coalesced and a
    /// refunded row is not downgraded by a replayed success.
    ///
    /// # Errors
    ///
    /// - `UniqueViolation` when a concurrent writer raced on another key
    /// - `DatabaseError` on persistence failure
    async fn upsert(
        &self,
        tx: &NewTransaction,
    ) -> Result<Upserted<Transaction, PaymentStatus>, DomainError>;

    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, DomainError>;

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Transaction>, DomainError>;

    /// Sets the status to `refunded`; returns false if it already was.
    async fn mark_refunded(&self, id: &TransactionId) -> Result<bool, DomainError>;

    /// Sets `subscription_id` when the row has none; returns whether it
    /// changed.
    async fn link_subscription(
        &self,
        id: &TransactionId,
        subscription_id: &SubscriptionId,
    ) -> Result<bool, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn TransactionRepository) {}
    }
}
