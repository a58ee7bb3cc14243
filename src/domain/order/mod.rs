//! Order domain - status lifecycle guarded by a strict transition table.

mod aggregate;
mod status;

pub use aggregate::Order;
pub use status::OrderStatus;
