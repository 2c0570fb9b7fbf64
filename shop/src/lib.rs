// shop/src/lib.rs

//! Storefront order and payment reconciliation service.
//!
//! Orders are built from authoritative catalogue prices, paid through a hosted payment
//! gateway (or by bank transfer / cash on delivery), and reconciled from both the
//! customer's return trip (`verify`) and the gateway's webhooks. Either path may
//! arrive first or repeat; each payment outcome is applied exactly once.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
