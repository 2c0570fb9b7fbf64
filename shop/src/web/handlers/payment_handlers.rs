// shop/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{OrderDetails, OrderSummary};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::pipelines::run_checkout;
use crate::services::notifications::OrderConfirmation;
use crate::services::order_builder::CreateOrderRequest;
use crate::services::reconciliation;
use crate::state::AppState;
use crate::web::extractors::OptionalUser;
use crate::web::handlers::order_handlers::PageQuery;

/// Creates the order and starts its payment in one call.
#[instrument(name = "handler::initialize_payment", skip(app_state, payload), fields(user_id = ?user.0))]
pub async fn initialize_payment_handler(
  app_state: web::Data<AppState>,
  user: OptionalUser,
  payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
  let data = CheckoutCtxData::for_new_order(app_state.get_ref().clone(), user.0, payload.into_inner(), true);
  let result = run_checkout(&app_state.registry, data).await?;

  let (Some(details), Some(initiation)) = (result.order, result.initiation) else {
    return Err(AppError::Internal("Checkout finished without a payment result".to_string()));
  };
  let mut body = serde_json::to_value(&initiation).map_err(|e| AppError::Internal(e.to_string()))?;
  if let Value::Object(fields) = &mut body {
    fields.insert("order_id".to_string(), json!(details.order.id));
    fields.insert("order_number".to_string(), json!(details.order.order_number));
    fields.insert("total_amount".to_string(), json!(details.order.total_amount));
  }
  Ok(HttpResponse::Ok().json(body))
}

#[instrument(name = "handler::verify_payment", skip(app_state))]
pub async fn verify_payment_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let result = reconciliation::verify_payment(&app_state, &path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(result))
}

#[instrument(name = "handler::get_order_by_number", skip(app_state))]
pub async fn get_order_by_number_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let order_number = path.into_inner();
  let order = app_state
    .store
    .find_order_by_number(&order_number)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_number)))?;
  let lines = app_state.store.order_lines(order.id).await?;
  let transactions = app_state.store.transactions_for_order(order.id).await?;
  Ok(HttpResponse::Ok().json(json!({
    "order": OrderDetails { order, lines },
    "transactions": transactions,
  })))
}

#[instrument(name = "handler::get_transaction", skip(app_state))]
pub async fn get_transaction_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
  let reference = path.into_inner();
  let transaction = app_state
    .store
    .find_transaction(&reference)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", reference)))?;
  Ok(HttpResponse::Ok().json(transaction))
}

/// Order history summaries for `user_id`. Only that user may ask.
#[instrument(name = "handler::get_user_orders", skip(app_state), fields(caller = ?user.0))]
pub async fn get_user_orders_handler(
  app_state: web::Data<AppState>,
  user: OptionalUser,
  path: web::Path<Uuid>,
  query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
  let user_id = path.into_inner();
  if user.0 != Some(user_id) {
    warn!(%user_id, "Order history requested for another user.");
    return Err(AppError::Unauthorized("Not allowed to list these orders".to_string()));
  }
  let (skip, limit) = query.bounds();
  let orders = app_state.store.orders_for_user(user_id, skip, limit).await?;

  let mut summaries = Vec::with_capacity(orders.len());
  for order in orders {
    let items_count = app_state.store.order_lines(order.id).await?.len();
    summaries.push(OrderSummary::new(order, items_count));
  }
  Ok(HttpResponse::Ok().json(summaries))
}

#[derive(Debug, Deserialize)]
pub struct SendOrderEmailPayload {
  #[serde(default)]
  pub order_number: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub customer_name: Option<String>,
}

/// Re-sends the confirmation for an existing order.
#[instrument(name = "handler::send_order_email", skip(app_state, payload))]
pub async fn send_order_email_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<SendOrderEmailPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
  let (Some(order_number), Some(email)) = (non_blank(payload.order_number), non_blank(payload.email)) else {
    return Err(AppError::Validation("Order number and email are required".to_string()));
  };

  let order = app_state
    .store
    .find_order_by_number(&order_number)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_number)))?;
  let lines = app_state.store.order_lines(order.id).await?;

  let message = OrderConfirmation::from_order(&order, &lines).with_recipient(email, payload.customer_name);
  app_state.notifier.order_confirmed(message);
  info!(%order_number, "Order confirmation re-send queued.");
  Ok(HttpResponse::Ok().json(json!({ "message": "Order confirmation email queued" })))
}
