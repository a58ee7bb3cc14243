//! Order aggregate.

use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::domain::foundation::{InvalidStateTransition, OrderId, StateMachine, Timestamp};

/// An order whose status only moves along the allowed transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub completed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    /// Creates a new pending order.
    pub fn new(now: Timestamp) -> Self {
        Self {
            id: OrderId::new(),
            status: OrderStatus::Pending,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the order to `target`.
    ///
    /// On rejection the order is left untouched, timestamps included.
    pub fn transition_to(
        &mut self,
        target: OrderStatus,
        now: Timestamp,
    ) -> Result<(), InvalidStateTransition> {
        self.status = self.status.transition_to(target)?;
        match target {
            OrderStatus::Completed => self.completed_at = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }
}
