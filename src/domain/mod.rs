//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, events)
//! - `billing` - Ledger records, unified statuses and provider status tables
//! - `order` - Order lifecycle guarded by a strict transition table
//! - `webhook` - Inbound envelope and typed provider events

pub mod billing;
pub mod foundation;
pub mod order;
pub mod webhook;
