// shop/src/pipelines/checkout_pipeline.rs

use shopflow::{ContextData, Pipeline, PipelineControl, Registry, SkipCondition};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::OrderDetails;
use crate::pipelines::contexts::CheckoutCtxData;
use crate::services::{order_builder, payments};

fn has_order() -> SkipCondition<CheckoutCtxData> {
  Arc::new(|ctx: ContextData<CheckoutCtxData>| ctx.read().order.is_some())
}

pub fn build_checkout_pipeline() -> Pipeline<CheckoutCtxData, AppError> {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    (
      "load_existing_order",
      false,
      Some(Arc::new(|ctx: ContextData<CheckoutCtxData>| {
        ctx.read().existing_order_id.is_none()
      })),
    ),
    ("validate_cart", false, Some(has_order())),
    ("price_cart", false, Some(has_order())),
    ("persist_order", false, Some(has_order())),
    (
      "initiate_payment",
      false,
      Some(Arc::new(|ctx: ContextData<CheckoutCtxData>| !ctx.read().initiate_payment)),
    ),
  ]);

  p.on_root("load_existing_order", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, user_id) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.existing_order_id, guard.user_id)
      };
      let order_id =
        order_id.ok_or_else(|| AppError::Internal("load_existing_order ran without an order id".to_string()))?;

      let order = app_state
        .store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
      // A registered caller only sees their own orders.
      if let (Some(caller), Some(owner)) = (user_id, order.user_id) {
        if caller != owner {
          warn!(%order_id, %caller, "Order requested by a different user.");
          return Err(AppError::NotFound(format!("Order {} not found", order_id)));
        }
      }
      let lines = app_state.store.order_lines(order_id).await?;

      ctx_data.write().order = Some(OrderDetails { order, lines });
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("validate_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let validated = {
        let guard = ctx_data.read();
        let request = guard
          .request
          .as_ref()
          .ok_or_else(|| AppError::Validation("Order details are required".to_string()))?;
        order_builder::validate(request, &guard.app_state.config.default_currency)?
      };
      ctx_data.write().validated = Some(validated);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("price_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, request) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.request.clone())
      };
      let request = request.ok_or_else(|| AppError::Validation("Order details are required".to_string()))?;

      let priced = order_builder::price_cart(app_state.store.as_ref(), &request).await?;
      ctx_data.write().priced = Some(priced);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("persist_order", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, request, validated, priced) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.user_id,
          guard.request.clone(),
          guard.validated.clone(),
          guard.priced.clone(),
        )
      };
      let (Some(request), Some(validated), Some(priced)) = (request, validated, priced) else {
        return Err(AppError::Internal("persist_order ran before validation and pricing".to_string()));
      };

      let details = order_builder::persist(&app_state, user_id, &request, &validated, &priced).await?;
      ctx_data.write().order = Some(details);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("initiate_payment", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, order) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order.as_ref().map(|d| d.order.clone()))
      };
      let order = order.ok_or_else(|| AppError::Internal("initiate_payment ran without an order".to_string()))?;

      let initiation = payments::initiate(&app_state, &order).await?;
      // Initiation changes reference and possibly status; show the stored state.
      let refreshed = app_state.store.find_order(order.id).await?;

      let mut guard = ctx_data.write();
      if let (Some(refreshed), Some(details)) = (refreshed, guard.order.as_mut()) {
        details.order = refreshed;
      }
      guard.initiation = Some(initiation);
      info!(order_number = %order.order_number, "Payment initiated.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p
}

pub fn register_checkout_pipeline(registry: &Registry<AppError>) {
  registry.register_pipeline(build_checkout_pipeline());
}
