//! PaymentCustomer repository port.

use async_trait::async_trait;

use crate::domain::billing::{PaymentCustomer, Provider};
use crate::domain::foundation::{CustomerId, DomainError};

/// Lookup of provider customers; the reconciler reads, onboarding writes.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Inserts or updates by id.
    ///
    /// # Errors
    ///
    /// - `UniqueViolation` if the user already has a customer at this
    ///   provider, or the provider customer belongs to another row
    async fn save(&self, customer: &PaymentCustomer) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<PaymentCustomer>, DomainError>;

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<PaymentCustomer>, DomainError>;
}
