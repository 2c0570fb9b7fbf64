// shop/src/store/mod.rs

//! Persistence boundary.
//!
//! `Store` serves single reads; every write goes through a `UnitOfWork` obtained from
//! `Store::begin`, which is all-or-nothing: nothing is visible to other callers until
//! `commit`, and dropping it without committing discards its writes.
//!
//! A unit of work must never be held across a payment gateway call.

pub mod memory;
pub mod postgres;
pub mod seed;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use seed::seed_demo_products;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Order, OrderLine, OrderStatus, PaymentStatus, Product, Transaction};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("duplicate value violates unique constraint '{constraint}'")]
  Duplicate { constraint: String },

  #[error("{0} not found")]
  NotFound(String),

  #[error("store backend error: {0}")]
  Backend(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
  fn from(err: sqlx::Error) -> Self {
    if let sqlx::Error::Database(db_err) = &err {
      if db_err.is_unique_violation() {
        return StoreError::Duplicate {
          constraint: db_err.constraint().unwrap_or("unknown").to_string(),
        };
      }
    }
    StoreError::Backend(err)
  }
}

impl StoreError {
  pub fn is_duplicate(&self) -> bool {
    matches!(self, StoreError::Duplicate { .. })
  }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";
pub const PAYMENT_REFERENCE_CONSTRAINT: &str = "orders_payment_reference_key";

#[async_trait]
pub trait Store: Send + Sync {
  async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
  async fn find_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
  /// Inserts a product unless one with the same id or SKU exists. Returns whether it was inserted.
  async fn insert_product(&self, product: &Product) -> StoreResult<bool>;

  async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>>;
  async fn find_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>>;
  async fn find_order_by_reference(&self, reference: &str) -> StoreResult<Option<Order>>;
  async fn order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>>;
  /// A user's orders, newest first.
  async fn orders_for_user(&self, user_id: Uuid, skip: i64, limit: i64) -> StoreResult<Vec<Order>>;

  async fn find_transaction(&self, reference: &str) -> StoreResult<Option<Transaction>>;
  async fn transactions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>>;

  async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

#[async_trait]
pub trait UnitOfWork: Send {
  /// Fails with `Duplicate` when the order number is already taken.
  async fn insert_order(&mut self, order: &Order, lines: &[OrderLine]) -> StoreResult<()>;

  /// Reads an order and holds it against concurrent writers until the unit ends.
  async fn lock_order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>>;

  /// Sets or clears the payment reference. Fails with `Duplicate` when another order holds it.
  async fn set_payment_reference(&mut self, order_id: Uuid, reference: Option<&str>) -> StoreResult<()>;

  /// Compare-and-set: installs `reference` only while the order's current reference equals
  /// `expected`, clearing any stored authorization and reopening payment as pending.
  /// Returns `false` when the order carries something else. Fails with `Duplicate` when
  /// another order holds `reference`.
  async fn claim_payment_reference(&mut self, order_id: Uuid, expected: Option<&str>, reference: &str)
    -> StoreResult<bool>;

  /// Stores the gateway authorization only while the order still carries `reference`.
  async fn record_authorization(
    &mut self,
    order_id: Uuid,
    reference: &str,
    authorization_url: &str,
    access_code: &str,
  ) -> StoreResult<bool>;

  /// Compare-and-set: moves the order to paid/processing only if it is not paid yet.
  /// Returns `false` when another writer got there first.
  async fn mark_paid(
    &mut self,
    order_id: Uuid,
    gateway_transaction_id: Option<&str>,
    paid_at: DateTime<Utc>,
  ) -> StoreResult<bool>;

  async fn set_payment_status(&mut self, order_id: Uuid, status: PaymentStatus) -> StoreResult<()>;
  async fn set_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> StoreResult<()>;

  /// Flips `stock_committed` from `from` to `!from`. Returns `false` if it was not `from`.
  async fn flip_stock_committed(&mut self, order_id: Uuid, from: bool) -> StoreResult<bool>;

  /// Adds `delta` to a product's stock, flooring the result at zero.
  /// Returns the new level, or `None` if the product does not exist.
  async fn adjust_stock(&mut self, product_id: Uuid, delta: i32) -> StoreResult<Option<i32>>;

  /// Inserts the row, or refreshes status, gateway response and paid time of the
  /// existing row with the same reference.
  async fn upsert_transaction(&mut self, transaction: &Transaction) -> StoreResult<()>;

  async fn commit(self: Box<Self>) -> StoreResult<()>;
  async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
