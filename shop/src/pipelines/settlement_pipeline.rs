// shop/src/pipelines/settlement_pipeline.rs

//! Applying gateway-reported outcomes to orders.
//!
//! Both pipelines start by resolving the order from the reference and stop early when
//! there is nothing to do (unknown reference, order already paid). The success
//! pipeline's write is a compare-and-set, so two concurrent deliveries of the same
//! success settle the order once.

use chrono::Utc;
use shopflow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::{PaymentStatus, TransactionStatus};
use crate::pipelines::contexts::{PaymentFailureCtxData, PaymentSuccessCtxData, SettlementOutcome};
use crate::services::notifications::OrderConfirmation;

pub fn build_payment_success_pipeline() -> Pipeline<PaymentSuccessCtxData, AppError> {
  let mut p = Pipeline::<PaymentSuccessCtxData, AppError>::new(&[
    ("resolve_order", false, None),
    ("guard_already_paid", false, None),
    ("settle_payment", false, None),
    ("mirror_inventory", true, None),
    ("dispatch_confirmation", true, None),
  ]);

  p.on_root("resolve_order", |ctx_data: ContextData<PaymentSuccessCtxData>| {
    Box::pin(async move {
      let (app_state, reference) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.transaction.reference.clone())
      };
      let Some(order) = app_state.store.find_order_by_reference(&reference).await? else {
        warn!(%reference, "Payment success for a reference no order carries; nothing applied.");
        ctx_data.write().outcome = SettlementOutcome::Unresolved;
        return Ok(PipelineControl::Stop);
      };
      let lines = app_state.store.order_lines(order.id).await?;

      ctx_data.update(|data| {
        data.order = Some(order);
        data.lines = lines;
      });
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("guard_already_paid", |ctx_data: ContextData<PaymentSuccessCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let already_paid = guard.order.as_ref().is_some_and(|o| o.is_paid());
      if already_paid {
        debug!(reference = %guard.transaction.reference, "Order already paid; success ignored.");
        guard.outcome = SettlementOutcome::AlreadyPaid;
        return Ok(PipelineControl::Stop);
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("settle_payment", |ctx_data: ContextData<PaymentSuccessCtxData>| {
    Box::pin(async move {
      let (app_state, transaction, order, lines) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.transaction.clone(),
          guard.order.clone(),
          guard.lines.clone(),
        )
      };
      let order = order.ok_or_else(|| AppError::Internal("settle_payment ran without an order".to_string()))?;

      if transaction.amount != order.total_amount || !transaction.currency.eq_ignore_ascii_case(&order.currency) {
        warn!(
          order_number = %order.order_number,
          reported = %transaction.amount,
          reported_currency = %transaction.currency,
          expected = %order.total_amount,
          "Gateway amount differs from order total."
        );
      }

      let paid_at = transaction.paid_at.unwrap_or_else(Utc::now);
      let mut uow = app_state.store.begin().await?;
      if !uow.mark_paid(order.id, transaction.gateway_id.as_deref(), paid_at).await? {
        uow.rollback().await?;
        debug!(order_number = %order.order_number, "Lost the settle race; order already paid.");
        ctx_data.write().outcome = SettlementOutcome::AlreadyPaid;
        return Ok(PipelineControl::Stop);
      }
      app_state.ledger.commit_order(uow.as_mut(), order.id, &lines).await?;
      uow.upsert_transaction(&transaction.to_record(order.id)).await?;
      uow.commit().await?;

      info!(
        order_number = %order.order_number,
        reference = %transaction.reference,
        amount = %transaction.amount,
        "Payment settled."
      );
      ctx_data.write().outcome = SettlementOutcome::Settled;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("mirror_inventory", |ctx_data: ContextData<PaymentSuccessCtxData>| {
    Box::pin(async move {
      let (app_state, product_ids) = {
        let guard = ctx_data.read();
        let ids: Vec<_> = guard.lines.iter().filter_map(|l| l.product_id).collect();
        (guard.app_state.clone(), ids)
      };
      app_state
        .ledger
        .mirror_levels(app_state.store.as_ref(), &product_ids)
        .await;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("dispatch_confirmation", |ctx_data: ContextData<PaymentSuccessCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, lines) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order.as_ref().map(|o| o.id), guard.lines.clone())
      };
      let Some(order_id) = order_id else {
        return Ok(PipelineControl::Continue);
      };
      let order = app_state
        .store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

      app_state
        .notifier
        .order_confirmed(OrderConfirmation::from_order(&order, &lines));
      ctx_data.write().confirmation_dispatched = true;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p
}

pub fn build_payment_failure_pipeline() -> Pipeline<PaymentFailureCtxData, AppError> {
  let mut p = Pipeline::<PaymentFailureCtxData, AppError>::new(&[
    ("resolve_order", false, None),
    ("guard_already_paid", false, None),
    ("record_failure", false, None),
  ]);

  p.on_root("resolve_order", |ctx_data: ContextData<PaymentFailureCtxData>| {
    Box::pin(async move {
      let (app_state, reference) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.transaction.reference.clone())
      };
      let Some(order) = app_state.store.find_order_by_reference(&reference).await? else {
        warn!(%reference, "Payment failure for a reference no order carries; nothing applied.");
        ctx_data.write().outcome = SettlementOutcome::Unresolved;
        return Ok(PipelineControl::Stop);
      };
      ctx_data.write().order = Some(order);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("guard_already_paid", |ctx_data: ContextData<PaymentFailureCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      if guard.order.as_ref().is_some_and(|o| o.is_paid()) {
        info!(
          reference = %guard.transaction.reference,
          status = guard.transaction.status.as_str(),
          "Late non-success report for a paid order ignored."
        );
        guard.outcome = SettlementOutcome::AlreadyPaid;
        return Ok(PipelineControl::Stop);
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("record_failure", |ctx_data: ContextData<PaymentFailureCtxData>| {
    Box::pin(async move {
      let (app_state, transaction, order_id) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.transaction.clone(),
          guard.order.as_ref().map(|o| o.id),
        )
      };
      let order_id =
        order_id.ok_or_else(|| AppError::Internal("record_failure ran without an order".to_string()))?;

      let mut uow = app_state.store.begin().await?;
      let current = uow
        .lock_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
      if current.is_paid() {
        uow.rollback().await?;
        ctx_data.write().outcome = SettlementOutcome::AlreadyPaid;
        return Ok(PipelineControl::Stop);
      }

      // A failure event is never recorded as a success the order does not reflect.
      let recorded_status = match transaction.status {
        TransactionStatus::Success => {
          warn!(
            reference = %transaction.reference,
            "Failure event carried a success status; recording it as failed."
          );
          TransactionStatus::Failed
        }
        other => other,
      };

      match recorded_status {
        TransactionStatus::Failed | TransactionStatus::Success => {
          uow.set_payment_status(order_id, PaymentStatus::Failed).await?;
        }
        TransactionStatus::Abandoned | TransactionStatus::Pending => {
          debug!(status = transaction.status.as_str(), "Payment still open; order stays pending.");
        }
        TransactionStatus::Reversed => {
          warn!(
            order_number = %current.order_number,
            reference = %transaction.reference,
            "Gateway reported a reversal; payment status left unchanged."
          );
        }
      }
      let mut record = transaction.to_record(order_id);
      record.status = recorded_status;
      uow.upsert_transaction(&record).await?;
      uow.commit().await?;

      info!(
        order_number = %current.order_number,
        status = recorded_status.as_str(),
        gateway_response = transaction.gateway_response.as_deref().unwrap_or(""),
        "Payment attempt recorded."
      );
      ctx_data.write().outcome = SettlementOutcome::FailureRecorded;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p
}

pub fn register_settlement_pipelines(registry: &Registry<AppError>) {
  registry.register_pipeline(build_payment_success_pipeline());
  registry.register_pipeline(build_payment_failure_pipeline());
}
