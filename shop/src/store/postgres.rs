// shop/src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use tracing::instrument;
use uuid::Uuid;

use super::{Store, StoreResult, UnitOfWork};
use crate::models::{Order, OrderLine, OrderStatus, PaymentStatus, Product, Transaction};

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_name, customer_email, customer_phone, \
  shipping_address, total_amount, currency, status, payment_status, payment_method, payment_reference, \
  authorization_url, access_code, gateway_transaction_id, stock_committed, order_data, notes, \
  created_at, updated_at, paid_at";

const LINE_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price, product_name, product_sku, \
  product_image, size, color, created_at";

const TRANSACTION_COLUMNS: &str = "id, order_id, reference, amount, currency, status, channel, \
  gateway_response, customer_email, customer_code, ip_address, authorization_code, card_last4, card_type, \
  bank, transaction_date, paid_at, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, sku, image, price, stock, is_active, created_at, updated_at";

/// Postgres-backed store. Migrations live in `shop/migrations`.
#[derive(Debug, Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(&self.pool).await
  }

  async fn find_order_where(&self, clause: &str, value: &str) -> StoreResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE {} = $1", ORDER_COLUMNS, clause);
    Ok(sqlx::query_as::<_, Order>(&sql).bind(value).fetch_optional(&self.pool).await?)
  }
}

#[async_trait]
impl Store for PgStore {
  async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
    Ok(sqlx::query_as::<_, Product>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn find_products(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS);
    Ok(sqlx::query_as::<_, Product>(&sql).bind(ids).fetch_all(&self.pool).await?)
  }

  async fn insert_product(&self, product: &Product) -> StoreResult<bool> {
    let result = sqlx::query(
      "INSERT INTO products (id, name, sku, image, price, stock, is_active, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT DO NOTHING",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.sku)
    .bind(&product.image)
    .bind(product.price)
    .bind(product.stock)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&sql).bind(id).fetch_optional(&self.pool).await?)
  }

  async fn find_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
    self.find_order_where("order_number", order_number).await
  }

  async fn find_order_by_reference(&self, reference: &str) -> StoreResult<Option<Order>> {
    self.find_order_where("payment_reference", reference).await
  }

  async fn order_lines(&self, order_id: Uuid) -> StoreResult<Vec<OrderLine>> {
    let sql = format!(
      "SELECT {} FROM order_lines WHERE order_id = $1 ORDER BY created_at, id",
      LINE_COLUMNS
    );
    Ok(sqlx::query_as::<_, OrderLine>(&sql).bind(order_id).fetch_all(&self.pool).await?)
  }

  async fn orders_for_user(&self, user_id: Uuid, skip: i64, limit: i64) -> StoreResult<Vec<Order>> {
    let sql = format!(
      "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC OFFSET $2 LIMIT $3",
      ORDER_COLUMNS
    );
    Ok(
      sqlx::query_as::<_, Order>(&sql)
        .bind(user_id)
        .bind(skip.max(0))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn find_transaction(&self, reference: &str) -> StoreResult<Option<Transaction>> {
    let sql = format!("SELECT {} FROM transactions WHERE reference = $1", TRANSACTION_COLUMNS);
    Ok(sqlx::query_as::<_, Transaction>(&sql).bind(reference).fetch_optional(&self.pool).await?)
  }

  async fn transactions_for_order(&self, order_id: Uuid) -> StoreResult<Vec<Transaction>> {
    let sql = format!(
      "SELECT {} FROM transactions WHERE order_id = $1 ORDER BY created_at",
      TRANSACTION_COLUMNS
    );
    Ok(sqlx::query_as::<_, Transaction>(&sql).bind(order_id).fetch_all(&self.pool).await?)
  }

  #[instrument(name = "PgStore::begin", skip(self), err(Display))]
  async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
    let tx = self.pool.begin().await?;
    Ok(Box::new(PgUnitOfWork { tx }))
  }
}

struct PgUnitOfWork {
  tx: PgTransaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
  async fn insert_order(&mut self, order: &Order, lines: &[OrderLine]) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO orders (id, order_number, user_id, customer_name, customer_email, customer_phone, \
       shipping_address, total_amount, currency, status, payment_status, payment_method, payment_reference, \
       authorization_url, access_code, gateway_transaction_id, stock_committed, order_data, notes, \
       created_at, updated_at, paid_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)",
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(order.user_id)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(&order.customer_phone)
    .bind(&order.shipping_address)
    .bind(order.total_amount)
    .bind(&order.currency)
    .bind(order.status)
    .bind(order.payment_status)
    .bind(order.payment_method)
    .bind(&order.payment_reference)
    .bind(&order.authorization_url)
    .bind(&order.access_code)
    .bind(&order.gateway_transaction_id)
    .bind(order.stock_committed)
    .bind(&order.order_data)
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .bind(order.paid_at)
    .execute(&mut *self.tx)
    .await?;

    for line in lines {
      sqlx::query(
        "INSERT INTO order_lines (id, order_id, product_id, quantity, unit_price, product_name, product_sku, \
         product_image, size, color, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
      )
      .bind(line.id)
      .bind(line.order_id)
      .bind(line.product_id)
      .bind(line.quantity)
      .bind(line.unit_price)
      .bind(&line.product_name)
      .bind(&line.product_sku)
      .bind(&line.product_image)
      .bind(&line.size)
      .bind(&line.color)
      .bind(line.created_at)
      .execute(&mut *self.tx)
      .await?;
    }
    Ok(())
  }

  async fn lock_order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1 FOR UPDATE", ORDER_COLUMNS);
    Ok(sqlx::query_as::<_, Order>(&sql).bind(order_id).fetch_optional(&mut *self.tx).await?)
  }

  async fn set_payment_reference(&mut self, order_id: Uuid, reference: Option<&str>) -> StoreResult<()> {
    sqlx::query(
      "UPDATE orders SET payment_reference = $2, \
       authorization_url = CASE WHEN $2 IS NULL THEN NULL ELSE authorization_url END, \
       access_code = CASE WHEN $2 IS NULL THEN NULL ELSE access_code END, \
       updated_at = now() WHERE id = $1",
    )
    .bind(order_id)
    .bind(reference)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn claim_payment_reference(
    &mut self,
    order_id: Uuid,
    expected: Option<&str>,
    reference: &str,
  ) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET payment_reference = $3, authorization_url = NULL, access_code = NULL, \
       payment_status = 'pending', updated_at = now() \
       WHERE id = $1 AND payment_reference IS NOT DISTINCT FROM $2",
    )
    .bind(order_id)
    .bind(expected)
    .bind(reference)
    .execute(&mut *self.tx)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn record_authorization(
    &mut self,
    order_id: Uuid,
    reference: &str,
    authorization_url: &str,
    access_code: &str,
  ) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET authorization_url = $3, access_code = $4, updated_at = now() \
       WHERE id = $1 AND payment_reference = $2",
    )
    .bind(order_id)
    .bind(reference)
    .bind(authorization_url)
    .bind(access_code)
    .execute(&mut *self.tx)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn mark_paid(
    &mut self,
    order_id: Uuid,
    gateway_transaction_id: Option<&str>,
    paid_at: DateTime<Utc>,
  ) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET payment_status = 'paid', status = 'processing', gateway_transaction_id = $2, \
       paid_at = $3, updated_at = now() WHERE id = $1 AND payment_status <> 'paid'",
    )
    .bind(order_id)
    .bind(gateway_transaction_id)
    .bind(paid_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn set_payment_status(&mut self, order_id: Uuid, status: PaymentStatus) -> StoreResult<()> {
    sqlx::query("UPDATE orders SET payment_status = $2, updated_at = now() WHERE id = $1")
      .bind(order_id)
      .bind(status)
      .execute(&mut *self.tx)
      .await?;
    Ok(())
  }

  async fn set_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> StoreResult<()> {
    sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
      .bind(order_id)
      .bind(status)
      .execute(&mut *self.tx)
      .await?;
    Ok(())
  }

  async fn flip_stock_committed(&mut self, order_id: Uuid, from: bool) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET stock_committed = NOT $2, updated_at = now() WHERE id = $1 AND stock_committed = $2",
    )
    .bind(order_id)
    .bind(from)
    .execute(&mut *self.tx)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn adjust_stock(&mut self, product_id: Uuid, delta: i32) -> StoreResult<Option<i32>> {
    let level: Option<(i32,)> = sqlx::query_as(
      "UPDATE products SET stock = GREATEST(stock + $2, 0), updated_at = now() WHERE id = $1 RETURNING stock",
    )
    .bind(product_id)
    .bind(delta)
    .fetch_optional(&mut *self.tx)
    .await?;
    Ok(level.map(|(stock,)| stock))
  }

  async fn upsert_transaction(&mut self, t: &Transaction) -> StoreResult<()> {
    sqlx::query(
      "INSERT INTO transactions (id, order_id, reference, amount, currency, status, channel, gateway_response, \
       customer_email, customer_code, ip_address, authorization_code, card_last4, card_type, bank, \
       transaction_date, paid_at, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) \
       ON CONFLICT (reference) DO UPDATE SET status = EXCLUDED.status, \
       gateway_response = EXCLUDED.gateway_response, \
       paid_at = COALESCE(EXCLUDED.paid_at, transactions.paid_at), updated_at = now()",
    )
    .bind(t.id)
    .bind(t.order_id)
    .bind(&t.reference)
    .bind(t.amount)
    .bind(&t.currency)
    .bind(t.status)
    .bind(&t.channel)
    .bind(&t.gateway_response)
    .bind(&t.customer_email)
    .bind(&t.customer_code)
    .bind(&t.ip_address)
    .bind(&t.authorization_code)
    .bind(&t.card_last4)
    .bind(&t.card_type)
    .bind(&t.bank)
    .bind(t.transaction_date)
    .bind(t.paid_at)
    .bind(t.created_at)
    .bind(t.updated_at)
    .execute(&mut *self.tx)
    .await?;
    Ok(())
  }

  async fn commit(self: Box<Self>) -> StoreResult<()> {
    self.tx.commit().await?;
    Ok(())
  }

  async fn rollback(self: Box<Self>) -> StoreResult<()> {
    self.tx.rollback().await?;
    Ok(())
  }
}
