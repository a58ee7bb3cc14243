//! Order lifecycle status and its transition table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Status of an order.
///
/// ```text
/// pending ──► confirmed ──► processing ──► shipped ──► completed
///    │            │              │
///    └────────────┴──────────────┴──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("order_status", format!("unknown value '{}'", s))
            })
    }
}

impl StateMachine for OrderStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Completed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use OrderStatus::*;
        match self {
            Pending => vec![Confirmed, Cancelled],
            Confirmed => vec![Processing, Cancelled],
            Processing => vec![Shipped, Cancelled],
            Shipped => vec![Completed],
            Completed | Cancelled => vec![],
        }
    }
}
