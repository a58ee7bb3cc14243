//! Refund repository port.

use async_trait::async_trait;

use super::Upserted;
use crate::domain::billing::{NewRefund, Provider, Refund, RefundStatus};
use crate::domain::foundation::{DomainError, TransactionId};

/// Ledger of provider refunds, unique per `(provider, external_id)`.
#[async_trait]
pub trait RefundRepository: Send + Sync {
    /// Inserts or updates the row for `refund.provider, refund.external_id`.
    async fn upsert(
        &self,
        refund: &NewRefund,
    ) -> Result<Upserted<Refund, RefundStatus>, DomainError>;

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Refund>, DomainError>;

    /// Links refunds stored without a parent whose `transaction_ref` names
    /// this payment; returns how many rows were linked.
    async fn link_orphans(
        &self,
        provider: Provider,
        transaction_ref: &str,
        transaction_id: &TransactionId,
    ) -> Result<u64, DomainError>;

    /// Sum of succeeded refund amounts recorded against a transaction.
    async fn sum_succeeded_for_transaction(&self, id: &TransactionId) -> Result<i64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn RefundRepository) {}
    }
}
