//! Invoice repository port.

use async_trait::async_trait;

use super::Upserted;
use crate::domain::billing::{Invoice, InvoiceStatus, Provider};
use crate::domain::foundation::{DomainError, InvoiceId, Timestamp, TransactionId};

/// Store for invoices derived locally or adopted from a provider.
///
/// Unique keys: `(provider, external_id)` when `external_id` is set and
/// `transaction_id` when set.
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Inserts a derived invoice unless one already exists for its
    /// transaction. Returns the stored invoice and whether it was inserted.
    async fn create_for_transaction(
        &self,
        invoice: &Invoice,
    ) -> Result<(Invoice, bool), DomainError>;

    /// Inserts or refreshes a provider invoice keyed by `(provider, external_id)`.
    ///
    /// On update the stored id, creation time and document fields are kept.
    ///
    /// # Errors
    ///
    /// - `UniqueViolation` when another invoice already owns the transaction
    async fn upsert_provider_invoice(
        &self,
        invoice: &Invoice,
    ) -> Result<Upserted<Invoice, InvoiceStatus>, DomainError>;

    /// Overwrites an existing row by id.
    async fn update(&self, invoice: &Invoice) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, DomainError>;

    async fn find_by_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Invoice>, DomainError>;

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Invoice>, DomainError>;

    /// Records the document path only if none is stored yet.
    ///
    /// Returns false when another writer got there first.
    async fn set_document(
        &self,
        id: &InvoiceId,
        path: &str,
        generated_at: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Oldest invoices without a document, at most `limit`.
    async fn find_without_document(&self, limit: u32) -> Result<Vec<Invoice>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn InvoiceRepository) {}
    }
}
