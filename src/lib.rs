//! Ledger Reconciler - Payment event reconciliation engine
//!
//! This crate ingests normalized webhook envelopes from payment providers
//! (Stripe, PayPal) and reconciles them into a consistent local ledger of
//! transactions, subscriptions, refunds and invoices.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod state;
