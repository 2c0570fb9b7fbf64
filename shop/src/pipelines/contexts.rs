// shop/src/pipelines/contexts.rs

//! Data carried through each pipeline run. Handlers receive these wrapped in
//! `shopflow::ContextData`.

use actix_web::web::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Order, OrderDetails, OrderLine};
use crate::services::gateway::{GatewayTransaction, WebhookEvent};
use crate::services::order_builder::{CreateOrderRequest, PricedCart, ValidatedRequest};
use crate::services::payments::PaymentInitiation;
use crate::state::AppState;

/// Order creation and, optionally, payment initiation.
#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub user_id: Option<Uuid>,
  /// Present when a new order is being created.
  pub request: Option<CreateOrderRequest>,
  /// Present when payment is initiated for an order that already exists.
  pub existing_order_id: Option<Uuid>,
  pub initiate_payment: bool,

  pub validated: Option<ValidatedRequest>,
  pub priced: Option<PricedCart>,
  pub order: Option<OrderDetails>,
  pub initiation: Option<PaymentInitiation>,
}

impl std::fmt::Debug for CheckoutCtxData {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CheckoutCtxData")
      .field("user_id", &self.user_id)
      .field("existing_order_id", &self.existing_order_id)
      .field("initiate_payment", &self.initiate_payment)
      .finish_non_exhaustive()
  }
}

impl CheckoutCtxData {
  pub fn for_new_order(app_state: AppState, user_id: Option<Uuid>, request: CreateOrderRequest, initiate: bool) -> Self {
    Self {
      app_state,
      user_id,
      request: Some(request),
      existing_order_id: None,
      initiate_payment: initiate,
      validated: None,
      priced: None,
      order: None,
      initiation: None,
    }
  }

  pub fn for_existing_order(app_state: AppState, user_id: Option<Uuid>, order_id: Uuid) -> Self {
    Self {
      app_state,
      user_id,
      request: None,
      existing_order_id: Some(order_id),
      initiate_payment: true,
      validated: None,
      priced: None,
      order: None,
      initiation: None,
    }
  }
}

/// How a reported payment outcome ended up being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
  /// Not decided yet; the pipeline has not finished.
  Pending,
  /// The order moved to paid in this run.
  Settled,
  /// The order was already paid; nothing changed.
  AlreadyPaid,
  /// No order carries the reported reference.
  Unresolved,
  /// A failed, abandoned or reversed attempt was recorded.
  FailureRecorded,
}

/// Gateway-confirmed success for one reference.
#[derive(Clone)]
pub struct PaymentSuccessCtxData {
  pub app_state: AppState,
  pub transaction: GatewayTransaction,
  pub order: Option<Order>,
  pub lines: Vec<OrderLine>,
  pub outcome: SettlementOutcome,
  pub confirmation_dispatched: bool,
}

impl PaymentSuccessCtxData {
  pub fn new(app_state: AppState, transaction: GatewayTransaction) -> Self {
    Self {
      app_state,
      transaction,
      order: None,
      lines: Vec::new(),
      outcome: SettlementOutcome::Pending,
      confirmation_dispatched: false,
    }
  }
}

/// Gateway-reported non-success (failed, abandoned, reversed, still pending).
#[derive(Clone)]
pub struct PaymentFailureCtxData {
  pub app_state: AppState,
  pub transaction: GatewayTransaction,
  pub order: Option<Order>,
  pub outcome: SettlementOutcome,
}

impl PaymentFailureCtxData {
  pub fn new(app_state: AppState, transaction: GatewayTransaction) -> Self {
    Self {
      app_state,
      transaction,
      order: None,
      outcome: SettlementOutcome::Pending,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookDisposition {
  Received,
  Ignored { reason: String },
  Handled { outcome: SettlementOutcome },
}

/// One webhook delivery, from raw bytes to acknowledgement.
#[derive(Clone)]
pub struct WebhookCtxData {
  pub app_state: AppState,
  pub raw_body: Bytes,
  pub signature: Option<String>,
  pub event: Option<WebhookEvent>,
  pub disposition: WebhookDisposition,
}

impl WebhookCtxData {
  pub fn new(app_state: AppState, raw_body: Bytes, signature: Option<String>) -> Self {
    Self {
      app_state,
      raw_body,
      signature,
      event: None,
      disposition: WebhookDisposition::Received,
    }
  }
}
