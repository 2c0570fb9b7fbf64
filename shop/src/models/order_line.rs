// shop/src/models/order_line.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Snapshot of one purchased product. Written with the order and never updated.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderLine {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Option<Uuid>,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub product_name: String,
  pub product_sku: Option<String>,
  pub product_image: Option<String>,
  pub size: Option<String>,
  pub color: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl OrderLine {
  pub fn line_total(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }
}
