// shop/src/models/order.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

use super::OrderLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Pending,
  Processing,
  Paid,
  Shipped,
  Delivered,
  Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
  Refunded,
  PartiallyPaid,
}

/// How the customer settles the order. Each variant has exactly one initiation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  #[default]
  #[serde(alias = "paystack", alias = "card")]
  Gateway,
  BankTransfer,
  CashOnDelivery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
  pub street: String,
  pub city: String,
  pub state: String,
  #[serde(default)]
  pub country: Option<String>,
  #[serde(default)]
  pub postal_code: Option<String>,
}

impl ShippingAddress {
  pub fn one_line(&self) -> String {
    let mut parts = vec![self.street.as_str(), self.city.as_str(), self.state.as_str()];
    if let Some(country) = self.country.as_deref() {
      parts.push(country);
    }
    let joined = parts.join(", ");
    match self.postal_code.as_deref() {
      Some(code) if !code.is_empty() => format!("{} - {}", joined, code),
      _ => joined,
    }
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: Option<Uuid>,
  pub customer_name: String,
  pub customer_email: String,
  pub customer_phone: String,
  pub shipping_address: Json<ShippingAddress>,
  pub total_amount: Decimal,
  pub currency: String,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub payment_method: PaymentMethod,
  /// Unique once set; the join key for gateway callbacks.
  pub payment_reference: Option<String>,
  pub authorization_url: Option<String>,
  pub access_code: Option<String>,
  pub gateway_transaction_id: Option<String>,
  /// Set once the ledger has decremented stock for every line.
  pub stock_committed: bool,
  /// Audit snapshot of the request as submitted (cart lines, billing address, declared total).
  pub order_data: serde_json::Value,
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
  pub fn is_paid(&self) -> bool {
    self.payment_status == PaymentStatus::Paid
  }
}

/// One row of a user's order history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
  pub id: Uuid,
  pub order_number: String,
  pub customer_name: String,
  pub customer_email: String,
  pub total_amount: Decimal,
  pub currency: String,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  /// "city, state" of the shipping address.
  pub shipping_info: String,
  pub created_at: DateTime<Utc>,
  pub paid_at: Option<DateTime<Utc>>,
  pub items_count: usize,
}

impl OrderSummary {
  pub fn new(order: Order, items_count: usize) -> Self {
    let shipping_info = format!("{}, {}", order.shipping_address.city, order.shipping_address.state);
    Self {
      id: order.id,
      order_number: order.order_number,
      customer_name: order.customer_name,
      customer_email: order.customer_email,
      total_amount: order.total_amount,
      currency: order.currency,
      status: order.status,
      payment_status: order.payment_status,
      shipping_info,
      created_at: order.created_at,
      paid_at: order.paid_at,
      items_count,
    }
  }
}

/// An order together with its lines, as returned by the order endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
  #[serde(flatten)]
  pub order: Order,
  pub lines: Vec<OrderLine>,
}
