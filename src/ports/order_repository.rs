//! Order repository port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::order::Order;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts or overwrites by id.
    async fn save(&self, order: &Order) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, DomainError>;
}
