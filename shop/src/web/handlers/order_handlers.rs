// shop/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Order, OrderDetails};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::pipelines::run_checkout;
use crate::services::order_builder::CreateOrderRequest;
use crate::state::AppState;
use crate::web::extractors::OptionalUser;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// `skip`/`limit` query parameters of the order history endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
  #[serde(default)]
  pub skip: Option<i64>,
  #[serde(default)]
  pub limit: Option<i64>,
}

impl PageQuery {
  /// Clamped `(skip, limit)`.
  pub fn bounds(&self) -> (i64, i64) {
    let skip = self.skip.unwrap_or(0).max(0);
    let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(0, MAX_PAGE_SIZE);
    (skip, limit)
  }
}

/// Loads an order visible to the caller. Someone else's order is reported as missing.
pub(crate) async fn load_visible_order(app_state: &AppState, user: OptionalUser, order_id: Uuid) -> Result<Order, AppError> {
  let order = app_state
    .store
    .find_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  if let (Some(caller), Some(owner)) = (user.0, order.user_id) {
    if caller != owner {
      warn!(%order_id, %caller, "Order requested by a different user.");
      return Err(AppError::NotFound(format!("Order {} not found", order_id)));
    }
  }
  Ok(order)
}

#[instrument(name = "handler::create_order", skip(app_state, payload), fields(user_id = ?user.0))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  user: OptionalUser,
  payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
  let data = CheckoutCtxData::for_new_order(app_state.get_ref().clone(), user.0, payload.into_inner(), false);
  let result = run_checkout(&app_state.registry, data).await?;

  let details = result
    .order
    .ok_or_else(|| AppError::Internal("Checkout completed without an order".to_string()))?;
  info!(order_number = %details.order.order_number, "Order created via API.");
  Ok(HttpResponse::Created().json(details))
}

/// The caller's orders with their lines, newest first.
#[instrument(name = "handler::list_user_orders", skip(app_state), fields(user_id = ?user.0))]
pub async fn list_user_orders_handler(
  app_state: web::Data<AppState>,
  user: OptionalUser,
  query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
  let Some(user_id) = user.0 else {
    return Err(AppError::Unauthorized("Sign in to list your orders".to_string()));
  };
  let (skip, limit) = query.bounds();
  let orders = app_state.store.orders_for_user(user_id, skip, limit).await?;

  let mut listed = Vec::with_capacity(orders.len());
  for order in orders {
    let lines = app_state.store.order_lines(order.id).await?;
    listed.push(OrderDetails { order, lines });
  }
  info!(count = listed.len(), "Listed user orders.");
  Ok(HttpResponse::Ok().json(listed))
}

#[instrument(name = "handler::get_order", skip(app_state), fields(user_id = ?user.0))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  user: OptionalUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = load_visible_order(&app_state, user, order_id).await?;
  let lines = app_state.store.order_lines(order_id).await?;
  Ok(HttpResponse::Ok().json(OrderDetails { order, lines }))
}

#[instrument(name = "handler::initiate_payment", skip(app_state), fields(user_id = ?user.0))]
pub async fn initiate_payment_handler(
  app_state: web::Data<AppState>,
  user: OptionalUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let data = CheckoutCtxData::for_existing_order(app_state.get_ref().clone(), user.0, path.into_inner());
  let result = run_checkout(&app_state.registry, data).await?;

  let (Some(details), Some(initiation)) = (result.order, result.initiation) else {
    return Err(AppError::Internal("Payment initiation finished without a result".to_string()));
  };
  Ok(HttpResponse::Ok().json(json!({ "order": details, "payment": initiation })))
}

#[instrument(name = "handler::update_stock", skip(app_state), fields(user_id = ?user.0))]
pub async fn update_stock_handler(
  app_state: web::Data<AppState>,
  user: OptionalUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = load_visible_order(&app_state, user, order_id).await?;
  if !order.is_paid() {
    info!(%order_id, "Stock update requested for an unpaid order.");
    return Ok(HttpResponse::Ok().json(json!({ "message": "Order not paid yet, stock not updated" })));
  }

  let moved = app_state
    .ledger
    .commit_order_now(app_state.store.as_ref(), order_id)
    .await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "Stock updated successfully",
    "order_id": order_id,
    "stock_changed": moved,
  })))
}

#[instrument(name = "handler::cancel_stock", skip(app_state), fields(user_id = ?user.0))]
pub async fn cancel_stock_handler(
  app_state: web::Data<AppState>,
  user: OptionalUser,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  load_visible_order(&app_state, user, order_id).await?;

  let moved = app_state
    .ledger
    .release_order_now(app_state.store.as_ref(), order_id)
    .await?;
  Ok(HttpResponse::Ok().json(json!({
    "message": "Stock restored successfully",
    "order_id": order_id,
    "stock_changed": moved,
  })))
}
