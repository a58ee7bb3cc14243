//! Order handlers.

mod transition_order;

pub use transition_order::{TransitionOrderCommand, TransitionOrderError, TransitionOrderHandler};
