//! In-memory orders.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::order::Order;
use crate::ports::OrderRepository;

#[derive(Default)]
pub struct InMemoryOrderRepository {
    rows: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), DomainError> {
        self.rows.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, DomainError> {
        Ok(self.rows.read().await.get(id).cloned())
    }
}
