//! TransitionOrderHandler - moves an order along its transition table.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::domain::foundation::{DomainError, InvalidStateTransition, OrderId, Timestamp};
use crate::domain::order::{Order, OrderStatus};
use crate::ports::OrderRepository;

#[derive(Debug, Clone)]
pub struct TransitionOrderCommand {
    pub order_id: OrderId,
    pub target: OrderStatus,
}

#[derive(Debug, Error)]
pub enum TransitionOrderError {
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidStateTransition),

    #[error(transparent)]
    Storage(#[from] DomainError),
}

pub struct TransitionOrderHandler {
    orders: Arc<dyn OrderRepository>,
}

impl TransitionOrderHandler {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    /// Loads, transitions and persists the order.
    ///
    /// A rejected transition persists nothing.
    pub async fn handle(&self, cmd: TransitionOrderCommand) -> Result<Order, TransitionOrderError> {
        let mut order = self
            .orders
            .find_by_id(&cmd.order_id)
            .await?
            .ok_or(TransitionOrderError::NotFound(cmd.order_id))?;

        let from = order.status;
        order.transition_to(cmd.target, Timestamp::now())?;
        self.orders.save(&order).await?;

        info!(order_id = %order.id, %from, to = %order.status, "Order transitioned");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryOrderRepository;

    async fn order_in(repo: &InMemoryOrderRepository, path: &[OrderStatus]) -> Order {
        let mut order = Order::new(Timestamp::now());
        for status in path {
            order.transition_to(*status, Timestamp::now()).unwrap();
        }
        repo.save(&order).await.unwrap();
        order
    }

    #[tokio::test]
    async fn completed_order_rejects_return_to_pending() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let completed = order_in(
            &repo,
            &[
                OrderStatus::Confirmed,
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::Completed,
            ],
        )
        .await;
        let handler = TransitionOrderHandler::new(repo.clone());

        let err = handler
            .handle(TransitionOrderCommand {
                order_id: completed.id,
                target: OrderStatus::Pending,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TransitionOrderError::InvalidTransition(_)));
        let stored = repo.find_by_id(&completed.id).await.unwrap().unwrap();
        assert_eq!(stored, completed);
    }

    #[tokio::test]
    async fn allowed_transition_is_persisted() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let order = order_in(&repo, &[]).await;
        let handler = TransitionOrderHandler::new(repo.clone());

        handler
            .handle(TransitionOrderCommand {
                order_id: order.id,
                target: OrderStatus::Cancelled,
            })
            .await
            .unwrap();

        let stored = repo.find_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(stored.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let handler = TransitionOrderHandler::new(Arc::new(InMemoryOrderRepository::new()));

        let err = handler
            .handle(TransitionOrderCommand {
                order_id: OrderId::new(),
                target: OrderStatus::Confirmed,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TransitionOrderError::NotFound(_)));
    }
}
