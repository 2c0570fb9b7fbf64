// shop/src/models/transaction.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
  Success,
  Failed,
  Abandoned,
  Reversed,
  Pending,
}

impl TransactionStatus {
  /// Maps a gateway status string. In-flight states (`ongoing`, `processing`, `queued`, ...)
  /// and anything unrecognised count as pending.
  pub fn from_gateway(raw: &str) -> Self {
    match raw.trim().to_ascii_lowercase().as_str() {
      "success" => TransactionStatus::Success,
      "failed" => TransactionStatus::Failed,
      "abandoned" => TransactionStatus::Abandoned,
      "reversed" => TransactionStatus::Reversed,
      _ => TransactionStatus::Pending,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      TransactionStatus::Success => "success",
      TransactionStatus::Failed => "failed",
      TransactionStatus::Abandoned => "abandoned",
      TransactionStatus::Reversed => "reversed",
      TransactionStatus::Pending => "pending",
    }
  }
}

/// Gateway-confirmed record of a payment attempt. At most one row per reference.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Transaction {
  pub id: Uuid,
  pub order_id: Uuid,
  pub reference: String,
  pub amount: Decimal,
  pub currency: String,
  pub status: TransactionStatus,
  pub channel: Option<String>,
  pub gateway_response: Option<String>,
  pub customer_email: Option<String>,
  pub customer_code: Option<String>,
  pub ip_address: Option<String>,
  pub authorization_code: Option<String>,
  pub card_last4: Option<String>,
  pub card_type: Option<String>,
  pub bank: Option<String>,
  pub transaction_date: Option<DateTime<Utc>>,
  pub paid_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
