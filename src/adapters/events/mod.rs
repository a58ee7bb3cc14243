//! Event bus adapters.
//!
//! - `InMemoryEventBus` - Synchronous, capturing bus for tests and local runs
//! - `ChannelEventBus` / `EventDispatcher` - Bounded channel with a retrying consumer task
//! - `IdempotentHandler` - Wrapper for at-most-once event processing

mod channel;
mod idempotent_handler;
pub(crate) mod in_memory;

pub use channel::{ChannelEventBus, ChannelEventBusConfig, EventDispatcher};
pub use idempotent_handler::IdempotentHandler;
pub use in_memory::InMemoryEventBus;
