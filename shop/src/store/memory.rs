// shop/src/store/memory.rs

//! In-process store used when no database is configured, and by the test suites.
//!
//! A unit of work holds the store mutex for its whole lifetime and works on a copy
//! of the state, so units are fully serialized and a dropped unit leaves no trace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
  Store, StoreError, StoreResult, UnitOfWork, ORDER_NUMBER_CONSTRAINT, PAYMENT_REFERENCE_CONSTRAINT,
};
use crate::models::{Order, OrderLine, OrderStatus, PaymentStatus, Product, Transaction};

#[derive(Debug, Clone, Default)]
struct MemoryState {
  products: HashMap<Uuid, Product>,
  orders: HashMap<Uuid, Order>,
  lines: HashMap<Uuid, Vec<OrderLine>>,
  transactions: HashMap<String, Transaction>,
}

impl MemoryState {
  fn order_mut(&mut self, order_id: Uuid) -> StoreResult<&mut Order> {
    self
      .orders
      .get_mut(&order_id)
      .ok_or_else(|| StoreError::NotFound(format!("order {}", order_id)))
  }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of persisted orders.
  pub async fn order_count(&self) -> usize {
    self.state.lock().await.orders.len()
  }

  /// Number of persisted order lines across all orders.
  pub async fn line_count(&self) -> usize {
    self.state.lock().await.lines.values().map(Vec::len).sum()
  }

  /// Number of transaction rows recorded for `reference` (0 or 1).
  pub async fn transaction_count(&self, reference: &str) -> usize {
    usize::from(self.state.lock().await.transactions.contains_key(reference))
  }

  pub async fn stock_of(&self, product_id: Uuid) -> Option<i32> {
    self.state.lock().await.products.get(&product_id).map(|p| p.stock)
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    Ok(self.state.lock().await.products.get(&id).cloned())
  }

  async fn find_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
    let state = self.state.lock().await;
    Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
  }

  async fn insert_product(&self, product: &Product) -> StoreResult<bool> {
    let mut state = self.state.lock().await;
    let sku_taken = product.sku.is_some() && state.products.values().any(|p| p.sku == product.sku);
    if sku_taken || state.products.contains_key(&product.id) {
      return Ok(false);
    }
    state.products.insert(product.id, product.clone());
    Ok(true)
  }

  async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
    Ok(self.state.lock().await.orders.get(&id).cloned())
  }

  async fn find_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
    let state = self.state.lock().await;
    Ok(state.orders.values().find(|o| o.order_number == order_number).cloned())
  }

  async fn find_order_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
    let state = self.state.lock().await;
    Ok(
      state
        .orders
        .values()
        .find(|o| o.payment_reference.as_deref() == Some(reference))
        .cloned(),
    )
  }

  async fn order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>> {
    Ok(self.state.lock().await.lines.get(&order_id).cloned().unwrap_or_default())
  }

  async fn orders_for_user(&self, user_id: Uuid, skip: i64, limit: i64) -> StoreResult<Vec<Order>> {
    let state = self.state.lock().await;
    let mut orders: Vec<Order> = state
      .orders
      .values()
      .filter(|o| o.user_id == Some(user_id))
      .cloned()
      .collect();
    orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
    let skip = usize::try_from(skip).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    Ok(orders.into_iter().skip(skip).take(limit).collect())
  }

  async fn find_transaction(&self, reference: &str) -> StoreResult<Option<Transaction>> {
    Ok(self.state.lock().await.transactions.get(reference).cloned())
  }

  async fn transactions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>> {
    let state = self.state.lock().await;
    let mut rows: Vec<Transaction> = state
      .transactions
      .values()
      .filter(|t| t.order_id == order_id)
      .cloned()
      .collect();
    rows.sort_by_key(|t| t.created_at);
    Ok(rows)
  }

  async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
    let guard = Arc::clone(&self.state).lock_owned().await;
    let working = guard.clone();
    Ok(Box::new(MemoryUnitOfWork { guard, working }))
  }
}

struct MemoryUnitOfWork {
  guard: OwnedMutexGuard<MemoryState>,
  working: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
  async fn insert_order(&mut self, order: &Order, lines: &[OrderLine]) -> StoreResult<()> {
    let state = &mut self.working;
    if state.orders.values().any(|o| o.order_number == order.order_number) {
      return Err(StoreError::Duplicate {
        constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
      });
    }
    state.orders.insert(order.id, order.clone());
    state.lines.insert(order.id, lines.to_vec());
    Ok(())
  }

  async fn lock_order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>> {
    Ok(self.working.orders.get(&order_id).cloned())
  }

  async fn set_payment_reference(&mut self, order_id: Uuid, reference: Option<&str>) -> StoreResult<()> {
    let state = &mut self.working;
    if let Some(reference) = reference {
      let taken = state
        .orders
        .values()
        .any(|o| o.id != order_id && o.payment_reference.as_deref() == Some(reference));
      if taken {
        return Err(StoreError::Duplicate {
          constraint: PAYMENT_REFERENCE_CONSTRAINT.to_string(),
        });
      }
    }
    let order = state.order_mut(order_id)?;
    order.payment_reference = reference.map(str::to_string);
    if reference.is_none() {
      order.authorization_url = None;
      order.access_code = None;
    }
    order.updated_at = Utc::now();
    Ok(())
  }

  async fn claim_payment_reference(
    &mut self,
    order_id: Uuid,
    expected: Option<&str>,
    reference: &str,
  ) -> StoreResult<bool> {
    let state = &mut self.working;
    let taken = state
      .orders
      .values()
      .any(|o| o.id != order_id && o.payment_reference.as_deref() == Some(reference));
    if taken {
      return Err(StoreError::Duplicate {
        constraint: PAYMENT_REFERENCE_CONSTRAINT.to_string(),
      });
    }
    let order = state.order_mut(order_id)?;
    if order.payment_reference.as_deref() != expected {
      return Ok(false);
    }
    order.payment_reference = Some(reference.to_string());
    order.authorization_url = None;
    order.access_code = None;
    order.payment_status = PaymentStatus::Pending;
    order.updated_at = Utc::now();
    Ok(true)
  }

  async fn record_authorization(
    &mut self,
    order_id: Uuid,
    reference: &str,
    authorization_url: &str,
    access_code: &str,
  ) -> StoreResult<bool> {
    let order = self.working.order_mut(order_id)?;
    if order.payment_reference.as_deref() != Some(reference) {
      return Ok(false);
    }
    order.authorization_url = Some(authorization_url.to_string());
    order.access_code = Some(access_code.to_string());
    order.updated_at = Utc::now();
    Ok(true)
  }

  async fn mark_paid(
    &mut self,
    order_id: Uuid,
    gateway_transaction_id: Option<&str>,
    paid_at: DateTime<Utc>,
  ) -> StoreResult<bool> {
    let order = self.working.order_mut(order_id)?;
    if order.payment_status == PaymentStatus::Paid {
      return Ok(false);
    }
    order.payment_status = PaymentStatus::Paid;
    order.status = OrderStatus::Processing;
    order.gateway_transaction_id = gateway_transaction_id.map(str::to_string);
    order.paid_at = Some(paid_at);
    order.updated_at = Utc::now();
    Ok(true)
  }

  async fn set_payment_status(&mut self, order_id: Uuid, status: PaymentStatus) -> StoreResult<()> {
    let order = self.working.order_mut(order_id)?;
    order.payment_status = status;
    order.updated_at = Utc::now();
    Ok(())
  }

  async fn set_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> StoreResult<()> {
    let order = self.working.order_mut(order_id)?;
    order.status = status;
    order.updated_at = Utc::now();
    Ok(())
  }

  async fn flip_stock_committed(&mut self, order_id: Uuid, from: bool) -> StoreResult<bool> {
    let order = self.working.order_mut(order_id)?;
    if order.stock_committed != from {
      return Ok(false);
    }
    order.stock_committed = !from;
    order.updated_at = Utc::now();
    Ok(true)
  }

  async fn adjust_stock(&mut self, product_id: Uuid, delta: i32) -> StoreResult<Option<i32>> {
    Ok(self.working.products.get_mut(&product_id).map(|product| {
      product.stock = product.stock.saturating_add(delta).max(0);
      product.updated_at = Utc::now();
      product.stock
    }))
  }

  async fn upsert_transaction(&mut self, transaction: &Transaction) -> StoreResult<()> {
    let now = Utc::now();
    self
      .working
      .transactions
      .entry(transaction.reference.clone())
      .and_modify(|existing| {
        existing.status = transaction.status;
        existing.gateway_response = transaction.gateway_response.clone();
        if transaction.paid_at.is_some() {
          existing.paid_at = transaction.paid_at;
        }
        existing.updated_at = now;
      })
      .or_insert_with(|| transaction.clone());
    Ok(())
  }

  async fn commit(self: Box<Self>) -> StoreResult<()> {
    let MemoryUnitOfWork { mut guard, working } = *self;
    *guard = working;
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    Ok(())
  }
}
