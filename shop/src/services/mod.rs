// shop/src/services/mod.rs

pub mod gateway;
pub mod inventory;
pub mod notifications;
pub mod order_builder;
pub mod payments;
pub mod reconciliation;
pub mod references;
