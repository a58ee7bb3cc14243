//! In-memory payment customers.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::billing::{PaymentCustomer, Provider};
use crate::domain::foundation::{CustomerId, DomainError};
use crate::ports::CustomerRepository;

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    rows: RwLock<HashMap<CustomerId, PaymentCustomer>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn save(&self, customer: &PaymentCustomer) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        for other in rows.values().filter(|c| c.id != customer.id) {
            if other.provider == customer.provider && other.user_id == customer.user_id {
                return Err(DomainError::unique_violation(
                    "PaymentCustomer",
                    format!("{}:{}", customer.user_id, customer.provider),
                ));
            }
            if other.provider == customer.provider && other.external_id == customer.external_id {
                return Err(DomainError::unique_violation(
                    "PaymentCustomer",
                    format!("{}:{}", customer.provider, customer.external_id),
                ));
            }
        }
        rows.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<PaymentCustomer>, DomainError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<PaymentCustomer>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|c| c.provider == provider && c.external_id == external_id)
            .cloned())
    }
}
