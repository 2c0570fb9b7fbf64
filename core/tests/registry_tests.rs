// core/tests/registry_tests.rs
mod common;

use common::*;
use shopflow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult, Registry};

#[derive(Clone, Debug, Default)]
struct CheckoutData {
  order_number: String,
}

#[derive(Clone, Debug, Default)]
struct SettlementData {
  paid: bool,
}

#[tokio::test]
async fn dispatches_by_context_type() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  let mut checkout = Pipeline::<CheckoutData, TestError>::new(&[("persist_order", false, None)]);
  checkout.on_root("persist_order", |ctx: ContextData<CheckoutData>| {
    Box::pin(async move {
      ctx.write().order_number = "ORD-20260101-ABCD1234".to_string();
      Ok::<_, FlowError>(PipelineControl::Continue)
    })
  });
  registry.register_pipeline(checkout);

  let mut settlement = Pipeline::<SettlementData, TestError>::new(&[("settle_payment", false, None)]);
  settlement.on_root("settle_payment", |ctx: ContextData<SettlementData>| {
    Box::pin(async move {
      ctx.write().paid = true;
      Ok::<_, FlowError>(PipelineControl::Continue)
    })
  });
  registry.register_pipeline(settlement);

  assert!(registry.step_names::<CheckoutData>().is_some());
  assert_eq!(
    registry.step_names::<SettlementData>(),
    Some(vec!["settle_payment".to_string()])
  );

  let checkout_ctx = ContextData::new(CheckoutData::default());
  assert_eq!(registry.run(checkout_ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(checkout_ctx.read().order_number, "ORD-20260101-ABCD1234");

  let settle_ctx = ContextData::new(SettlementData::default());
  registry.run(settle_ctx.clone()).await.unwrap();
  assert!(settle_ctx.read().paid);
}

#[tokio::test]
async fn unregistered_type_is_a_configuration_error() {
  setup_tracing();
  let registry = Registry::<TestError>::new();

  #[derive(Default)]
  struct RefundData;

  let result = registry.run(ContextData::new(RefundData)).await;
  match result {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("ConfigurationError"));
      assert!(s.contains("RefundData"));
    }
    other => panic!("expected ConfigurationError, got {:?}", other),
  }
}

#[tokio::test]
async fn handler_errors_pass_through_registry() {
  setup_tracing();
  let registry = Registry::<TestError>::new();
  let mut pipeline = Pipeline::<SettlementData, TestError>::new(&[("settle_payment", false, None)]);
  pipeline.on_root("settle_payment", |_ctx: ContextData<SettlementData>| {
    Box::pin(async move { Err(TestError::Handler("ledger rejected commit".to_string())) })
  });
  registry.register_pipeline(pipeline);

  let err = registry.run(ContextData::new(SettlementData::default())).await.unwrap_err();
  assert_eq!(err, TestError::Handler("ledger rejected commit".to_string()));
}

#[tokio::test]
async fn default_registry_uses_flow_error() {
  setup_tracing();
  let registry: Registry = Registry::default();
  let mut pipeline = Pipeline::<CheckoutData, FlowError>::new(&[("persist_order", false, None)]);
  pipeline.on_root("persist_order", |ctx: ContextData<CheckoutData>| {
    Box::pin(async move {
      ctx.write().order_number = "ORD-1".to_string();
      Ok::<_, FlowError>(PipelineControl::Continue)
    })
  });
  registry.register_pipeline(pipeline);

  let ctx = ContextData::new(CheckoutData::default());
  registry.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().order_number, "ORD-1");
}
