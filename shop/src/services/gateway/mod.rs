// shop/src/services/gateway/mod.rs

//! Payment gateway boundary.
//!
//! The rest of the crate talks to the gateway only through `PaymentGateway`, so tests
//! can swap in a scripted implementation. Amounts cross this boundary in major units;
//! conversion to the gateway's minor units happens inside the adapter.

pub mod paystack;
pub mod signature;

pub use paystack::PaystackGateway;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Transaction, TransactionStatus};

#[derive(Debug, Error)]
pub enum GatewayError {
  /// Timeout, connection failure or a 5xx from the gateway. Safe to retry.
  #[error("gateway unavailable: {0}")]
  Unavailable(String),

  /// The gateway answered and said no (`status: false`).
  #[error("gateway rejected the request: {0}")]
  Rejected(String),

  #[error("malformed gateway payload: {0}")]
  Malformed(String),

  #[error("invalid amount: {0}")]
  InvalidAmount(String),

  #[error("gateway is not configured: {0}")]
  NotConfigured(String),
}

impl From<GatewayError> for AppError {
  fn from(err: GatewayError) -> Self {
    match err {
      GatewayError::Unavailable(m) => AppError::GatewayUnavailable(m),
      GatewayError::Rejected(m) => AppError::PaymentInitializationFailed(m),
      GatewayError::Malformed(m) => AppError::Internal(format!("Malformed gateway payload: {}", m)),
      GatewayError::InvalidAmount(m) => AppError::Validation(m),
      GatewayError::NotConfigured(m) => AppError::Config(m),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
  /// Major units, e.g. `1000.00` NGN.
  pub amount: Decimal,
  pub currency: String,
  pub email: String,
  pub reference: String,
  pub callback_url: String,
  pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitializedPayment {
  pub authorization_url: String,
  pub access_code: String,
  pub reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CardAuthorization {
  pub authorization_code: Option<String>,
  pub last4: Option<String>,
  pub card_type: Option<String>,
  pub bank: Option<String>,
}

/// A payment attempt as the gateway reports it, from `verify` or a webhook.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayTransaction {
  pub gateway_id: Option<String>,
  pub reference: String,
  pub status: TransactionStatus,
  /// Status string exactly as the gateway sent it.
  pub raw_status: String,
  /// Major units.
  pub amount: Decimal,
  pub currency: String,
  pub channel: Option<String>,
  pub gateway_response: Option<String>,
  pub customer_email: Option<String>,
  pub customer_code: Option<String>,
  pub ip_address: Option<String>,
  pub authorization: CardAuthorization,
  pub transaction_date: Option<DateTime<Utc>>,
  pub paid_at: Option<DateTime<Utc>>,
}

impl GatewayTransaction {
  /// The local ledger row for this attempt against `order_id`.
  pub fn to_record(&self, order_id: Uuid) -> Transaction {
    let now = Utc::now();
    Transaction {
      id: Uuid::new_v4(),
      order_id,
      reference: self.reference.clone(),
      amount: self.amount,
      currency: self.currency.clone(),
      status: self.status,
      channel: self.channel.clone(),
      gateway_response: self.gateway_response.clone(),
      customer_email: self.customer_email.clone(),
      customer_code: self.customer_code.clone(),
      ip_address: self.ip_address.clone(),
      authorization_code: self.authorization.authorization_code.clone(),
      card_last4: self.authorization.last4.clone(),
      card_type: self.authorization.card_type.clone(),
      bank: self.authorization.bank.clone(),
      transaction_date: self.transaction_date,
      paid_at: self.paid_at,
      created_at: now,
      updated_at: now,
    }
  }
}

#[derive(Debug, Clone)]
pub enum WebhookEvent {
  ChargeSuccess(GatewayTransaction),
  ChargeFailed(GatewayTransaction),
  /// Any event name the service does not act on.
  Other(String),
}

impl WebhookEvent {
  pub fn name(&self) -> &str {
    match self {
      WebhookEvent::ChargeSuccess(_) => "charge.success",
      WebhookEvent::ChargeFailed(_) => "charge.failed",
      WebhookEvent::Other(name) => name,
    }
  }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  async fn initialize(&self, request: &InitializeRequest) -> Result<InitializedPayment, GatewayError>;

  async fn verify(&self, reference: &str) -> Result<GatewayTransaction, GatewayError>;

  /// Checks the webhook signature header against the raw request bytes.
  fn validate_signature(&self, raw_body: &[u8], signature: Option<&str>) -> bool;

  /// Parses an already-authenticated webhook body.
  fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError>;

  /// Public key handed to the browser for inline checkout, if any.
  fn public_key(&self) -> Option<String> {
    None
  }
}

/// Major to minor units (`× 100`). The amount must be positive with at most two
/// fractional digits.
pub fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
  if amount <= Decimal::ZERO {
    return Err(GatewayError::InvalidAmount(format!("Amount must be positive, got {}", amount)));
  }
  if amount.normalize().scale() > 2 {
    return Err(GatewayError::InvalidAmount(format!(
      "Amount {} has more than two fractional digits",
      amount
    )));
  }
  (amount * Decimal::ONE_HUNDRED)
    .trunc()
    .to_i64()
    .ok_or_else(|| GatewayError::InvalidAmount(format!("Amount {} is out of range", amount)))
}

pub fn from_minor_units(minor: i64) -> Decimal {
  Decimal::new(minor, 2).normalize()
}
