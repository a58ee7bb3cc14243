//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-memory repositories for tests and local runs
//! - `postgres` - PostgreSQL repositories and migrations
//! - `events` - Event bus implementations (in-memory, channel)
//! - `document` - Invoice renderers and document storage
//! - `notification` - Notification sinks (log, Resend)
//! - `http` - Webhook HTTP boundary

pub mod document;
pub mod events;
pub mod http;
pub mod memory;
pub mod notification;
pub mod postgres;
mod stores;

pub use events::{
    ChannelEventBus, ChannelEventBusConfig, EventDispatcher, IdempotentHandler, InMemoryEventBus,
};
pub use stores::LedgerStores;
