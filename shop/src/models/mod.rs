// shop/src/models/mod.rs

//! Persistent entities: products, orders with their lines, and gateway transactions.

pub mod order;
pub mod order_line;
pub mod product;
pub mod transaction;

pub use order::{Order, OrderDetails, OrderStatus, OrderSummary, PaymentMethod, PaymentStatus, ShippingAddress};
pub use order_line::OrderLine;
pub use product::Product;
pub use transaction::{Transaction, TransactionStatus};
