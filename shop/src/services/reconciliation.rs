// shop/src/services/reconciliation.rs

//! Reconciliation engine.
//!
//! Two entry points feed the same outcome pipelines: the pull path (`verify_payment`,
//! driven by the customer returning from the gateway) and the push path
//! (`handle_webhook`, driven by the gateway). Either may arrive first, both may arrive
//! at once, and each may be repeated; the outcome pipelines make every repetition a
//! no-op.

use actix_web::web::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shopflow::ContextData;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{OrderStatus, PaymentStatus, TransactionStatus};
use crate::pipelines::contexts::{
  PaymentFailureCtxData, PaymentSuccessCtxData, SettlementOutcome, WebhookCtxData, WebhookDisposition,
};
use crate::services::gateway::{GatewayError, GatewayTransaction};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct VerificationData {
  pub order_number: String,
  pub order_id: Uuid,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub amount: Decimal,
  pub paid_at: Option<DateTime<Utc>>,
  pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
  pub success: bool,
  /// The gateway's own wording, e.g. "Approved" or "Declined".
  pub message: String,
  pub outcome: SettlementOutcome,
  pub data: VerificationData,
}

/// Runs the success pipeline for a gateway-confirmed payment.
#[instrument(name = "reconciliation::apply_success", skip_all, fields(reference = %transaction.reference), err(Display))]
pub async fn apply_success(app_state: &AppState, transaction: GatewayTransaction) -> AppResult<SettlementOutcome> {
  let ctx_data = ContextData::new(PaymentSuccessCtxData::new(app_state.clone(), transaction));
  app_state.registry.run(ctx_data.clone()).await?;
  let outcome = ctx_data.read().outcome;
  Ok(outcome)
}

/// Runs the failure pipeline for any non-success report.
#[instrument(name = "reconciliation::apply_failure", skip_all, fields(reference = %transaction.reference), err(Display))]
pub async fn apply_failure(app_state: &AppState, transaction: GatewayTransaction) -> AppResult<SettlementOutcome> {
  let ctx_data = ContextData::new(PaymentFailureCtxData::new(app_state.clone(), transaction));
  app_state.registry.run(ctx_data.clone()).await?;
  let outcome = ctx_data.read().outcome;
  Ok(outcome)
}

/// Routes a verified transaction by its gateway status.
pub async fn apply_outcome(app_state: &AppState, transaction: GatewayTransaction) -> AppResult<SettlementOutcome> {
  match transaction.status {
    TransactionStatus::Success => apply_success(app_state, transaction).await,
    TransactionStatus::Failed
    | TransactionStatus::Abandoned
    | TransactionStatus::Reversed
    | TransactionStatus::Pending => apply_failure(app_state, transaction).await,
  }
}

/// Pull path. An unknown reference fails with `NotFound` before the gateway is called.
#[instrument(name = "reconciliation::verify_payment", skip(app_state), err(Display))]
pub async fn verify_payment(app_state: &AppState, reference: &str) -> AppResult<VerificationResult> {
  let reference = reference.trim();
  if reference.is_empty() {
    return Err(AppError::Validation("Payment reference is required".to_string()));
  }
  let order = app_state
    .store
    .find_order_by_reference(reference)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("No order found for reference {}", reference)))?;

  let transaction = app_state.gateway.verify(reference).await.map_err(|e| match e {
    GatewayError::Rejected(message) => {
      AppError::NotFound(format!("Gateway has no transaction {}: {}", reference, message))
    }
    other => AppError::from(other),
  })?;
  if transaction.reference != reference {
    warn!(requested = %reference, reported = %transaction.reference, "Gateway verified a different reference.");
    return Err(AppError::Internal(format!(
      "Gateway answered for reference {} instead of {}",
      transaction.reference, reference
    )));
  }

  let success = transaction.status == TransactionStatus::Success;
  let message = transaction
    .gateway_response
    .clone()
    .unwrap_or_else(|| transaction.raw_status.clone());
  let amount = transaction.amount;
  let reported_paid_at = transaction.paid_at;

  let outcome = apply_outcome(app_state, transaction).await?;
  let order = app_state
    .store
    .find_order(order.id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order.id)))?;
  info!(order_number = %order.order_number, ?outcome, success, "Payment verified.");

  Ok(VerificationResult {
    success,
    message,
    outcome,
    data: VerificationData {
      order_number: order.order_number,
      order_id: order.id,
      status: order.status,
      payment_status: order.payment_status,
      amount,
      paid_at: order.paid_at.or(reported_paid_at),
      reference: reference.to_string(),
    },
  })
}

/// Push path: signature, parse, route and acknowledge, in that order.
#[instrument(name = "reconciliation::handle_webhook", skip_all, fields(body_len = raw_body.len()), err(Display))]
pub async fn handle_webhook(
  app_state: &AppState,
  raw_body: Bytes,
  signature: Option<String>,
) -> AppResult<WebhookDisposition> {
  let ctx_data = ContextData::new(WebhookCtxData::new(app_state.clone(), raw_body, signature));
  app_state.registry.run(ctx_data.clone()).await?;
  let disposition = ctx_data.map_read(|data| &data.disposition).clone();
  Ok(disposition)
}
