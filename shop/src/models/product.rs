// shop/src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub sku: Option<String>,
  pub image: Option<String>,
  pub price: Decimal,
  pub stock: i32,
  pub is_active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Product {
  /// A product with the given price and stock, active, stamped now.
  pub fn new(name: impl Into<String>, price: Decimal, stock: i32) -> Self {
    let now = Utc::now();
    Self {
      id: Uuid::new_v4(),
      name: name.into(),
      sku: None,
      image: None,
      price,
      stock,
      is_active: true,
      created_at: now,
      updated_at: now,
    }
  }
}
