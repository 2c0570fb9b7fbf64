// shop/src/services/payments.rs

//! Payment initiation, one path per `PaymentMethod`.
//!
//! The gateway path is two-phase. The reference is reserved and committed first, the
//! gateway is called with no unit of work open, and the outcome is then written in a
//! second unit of work. A failed call clears the reservation so the order can be
//! initiated again. A reference that may still be paid through is never replaced.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::services::gateway::InitializeRequest;
use crate::state::AppState;

pub const CASH_ON_DELIVERY_MESSAGE: &str = "Order placed successfully. Pay on delivery.";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentInitiation {
  #[serde(rename = "paystack")]
  Gateway {
    authorization_url: String,
    access_code: String,
    reference: String,
    public_key: Option<String>,
    amount: Decimal,
    currency: String,
  },
  BankTransfer {
    bank_name: String,
    account_name: String,
    account_number: String,
    amount: Decimal,
    currency: String,
    reference: String,
  },
  CashOnDelivery {
    message: String,
    order_status: OrderStatus,
  },
}

impl PaymentInitiation {
  pub fn reference(&self) -> Option<&str> {
    match self {
      PaymentInitiation::Gateway { reference, .. } | PaymentInitiation::BankTransfer { reference, .. } => {
        Some(reference)
      }
      PaymentInitiation::CashOnDelivery { .. } => None,
    }
  }
}

fn ensure_initiable(order: &Order) -> AppResult<()> {
  if order.status != OrderStatus::Pending || order.is_paid() {
    return Err(AppError::Validation(format!(
      "Order {} cannot be paid in its current state ({:?}/{:?})",
      order.order_number, order.status, order.payment_status
    )));
  }
  Ok(())
}

/// Starts payment for a pending order according to its payment method.
#[instrument(
  name = "payments::initiate",
  skip_all,
  fields(order_id = %order.id, method = ?order.payment_method),
  err(Display)
)]
pub async fn initiate(app_state: &AppState, order: &Order) -> AppResult<PaymentInitiation> {
  ensure_initiable(order)?;
  match order.payment_method {
    PaymentMethod::Gateway => initiate_gateway(app_state, order).await,
    PaymentMethod::BankTransfer => initiate_bank_transfer(app_state, order).await,
    PaymentMethod::CashOnDelivery => initiate_cash_on_delivery(app_state, order).await,
  }
}

/// What phase one found on the order.
enum Reservation {
  /// The current attempt already completed both phases.
  Existing {
    order: Order,
    reference: String,
    authorization_url: String,
    access_code: String,
  },
  /// A fresh reference, committed and waiting for the gateway call.
  Reserved { order: Order, reference: String },
}

fn in_progress(order: &Order) -> AppError {
  AppError::PaymentInProgress(format!(
    "Payment initialization for order {} is already in progress",
    order.order_number
  ))
}

/// A reservation still without an authorization after two gateway timeouts belongs to a
/// call that never finished.
fn reservation_expired(app_state: &AppState, order: &Order) -> bool {
  let window = chrono::Duration::from_std(app_state.config.paystack.timeout * 2)
    .unwrap_or_else(|_| chrono::Duration::days(1));
  Utc::now().signed_duration_since(order.updated_at) > window
}

/// Phase one. A pending attempt is either handed back (authorized) or reported as in
/// progress (still waiting on the gateway). Otherwise a fresh reference is claimed,
/// replacing only the reference of a failed or expired attempt.
async fn reserve_reference(app_state: &AppState, order_id: Uuid) -> AppResult<Reservation> {
  let attempts = app_state.config.max_number_attempts;
  for attempt in 1..=attempts {
    let mut uow = app_state.store.begin().await?;
    let order = uow
      .lock_order(order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    ensure_initiable(&order)?;

    let expected = match (order.payment_status, order.payment_reference.clone()) {
      (PaymentStatus::Pending, Some(reference)) => {
        if let (Some(authorization_url), Some(access_code)) =
          (order.authorization_url.clone(), order.access_code.clone())
        {
          uow.rollback().await?;
          return Ok(Reservation::Existing {
            order,
            reference,
            authorization_url,
            access_code,
          });
        }
        if !reservation_expired(app_state, &order) {
          uow.rollback().await?;
          warn!(%reference, "Gateway initialization already in flight for this order.");
          return Err(in_progress(&order));
        }
        warn!(%reference, "Reservation outlived every gateway call; replacing it.");
        Some(reference)
      }
      (_, current) => current,
    };

    let reference = app_state.minter.payment_reference(&order.order_number);
    match uow.claim_payment_reference(order_id, expected.as_deref(), &reference).await {
      Ok(true) => {
        uow.commit().await?;
        if let Some(previous) = expected {
          info!(%previous, %reference, "Previous payment attempt failed; new reference issued.");
        }
        return Ok(Reservation::Reserved { order, reference });
      }
      Ok(false) => {
        uow.rollback().await?;
        return Err(in_progress(&order));
      }
      Err(e) if e.is_duplicate() => {
        uow.rollback().await?;
        warn!(attempt, %reference, "Payment reference collision; minting another.");
      }
      Err(e) => return Err(e.into()),
    }
  }
  Err(AppError::Internal(format!(
    "Could not allocate a unique payment reference after {} attempts",
    attempts
  )))
}

/// Clears `reference` from the order unless something else has replaced it meanwhile.
async fn release_reference(app_state: &AppState, order_id: Uuid, reference: &str) -> AppResult<()> {
  let mut uow = app_state.store.begin().await?;
  let still_ours = uow
    .lock_order(order_id)
    .await?
    .map(|o| o.payment_reference.as_deref() == Some(reference) && !o.is_paid())
    .unwrap_or(false);
  if still_ours {
    uow.set_payment_reference(order_id, None).await?;
    uow.commit().await?;
  } else {
    uow.rollback().await?;
  }
  Ok(())
}

async fn initiate_gateway(app_state: &AppState, order: &Order) -> AppResult<PaymentInitiation> {
  let (order, reference) = match reserve_reference(app_state, order.id).await? {
    Reservation::Existing {
      order,
      reference,
      authorization_url,
      access_code,
    } => {
      info!(%reference, "Reusing existing gateway authorization.");
      return Ok(PaymentInitiation::Gateway {
        authorization_url,
        access_code,
        reference,
        public_key: app_state.gateway.public_key(),
        amount: order.total_amount,
        currency: order.currency,
      });
    }
    Reservation::Reserved { order, reference } => (order, reference),
  };

  let request = InitializeRequest {
    amount: order.total_amount,
    currency: order.currency.clone(),
    email: order.customer_email.clone(),
    reference: reference.clone(),
    callback_url: app_state.config.callback_url(),
    metadata: json!({
      "order_number": order.order_number,
      "order_id": order.id,
      "customer_name": order.customer_name,
    }),
  };

  let initialized = match app_state.gateway.initialize(&request).await {
    Ok(initialized) => initialized,
    Err(gateway_err) => {
      warn!(%reference, error = %gateway_err, "Gateway initialization failed; releasing reference.");
      if let Err(e) = release_reference(app_state, order.id, &reference).await {
        warn!(%reference, error = %e, "Could not release payment reference.");
      }
      return Err(gateway_err.into());
    }
  };

  let mut uow = app_state.store.begin().await?;
  let recorded = uow
    .record_authorization(order.id, &reference, &initialized.authorization_url, &initialized.access_code)
    .await?;
  if !recorded {
    uow.rollback().await?;
    warn!(%reference, "Order no longer carries this reference; authorization discarded.");
    return Err(in_progress(&order));
  }
  uow.commit().await?;
  info!(%reference, "Gateway payment initialized.");

  Ok(PaymentInitiation::Gateway {
    authorization_url: initialized.authorization_url,
    access_code: initialized.access_code,
    reference,
    public_key: app_state.gateway.public_key(),
    amount: order.total_amount,
    currency: order.currency,
  })
}

async fn initiate_bank_transfer(app_state: &AppState, order: &Order) -> AppResult<PaymentInitiation> {
  let reference = format!("BANK-{}", order.order_number);
  if order.payment_reference.as_deref() != Some(reference.as_str()) {
    let mut uow = app_state.store.begin().await?;
    uow.set_payment_reference(order.id, Some(&reference)).await?;
    uow.commit().await?;
  }
  let bank = &app_state.config.bank_transfer;
  info!(%reference, "Bank transfer instructions issued.");
  Ok(PaymentInitiation::BankTransfer {
    bank_name: bank.bank_name.clone(),
    account_name: bank.account_name.clone(),
    account_number: bank.account_number.clone(),
    amount: order.total_amount,
    currency: order.currency.clone(),
    reference,
  })
}

/// Accepts the order for delivery: processing status and committed stock in one
/// unit of work. No transaction row is written since no gateway is involved.
async fn initiate_cash_on_delivery(app_state: &AppState, order: &Order) -> AppResult<PaymentInitiation> {
  let lines = app_state.store.order_lines(order.id).await?;
  let mut uow = app_state.store.begin().await?;
  let current = uow
    .lock_order(order.id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order.id)))?;
  ensure_initiable(&current)?;
  uow.set_order_status(order.id, OrderStatus::Processing).await?;
  app_state.ledger.commit_order(uow.as_mut(), order.id, &lines).await?;
  uow.commit().await?;
  info!(order_number = %order.order_number, "Cash-on-delivery order accepted.");

  Ok(PaymentInitiation::CashOnDelivery {
    message: CASH_ON_DELIVERY_MESSAGE.to_string(),
    order_status: OrderStatus::Processing,
  })
}
