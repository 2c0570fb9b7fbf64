// core/tests/error_handling_tests.rs
mod common;

use common::*;
use shopflow::{ContextData, FlowError, Pipeline, PipelineControl};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn handler_missing_names_the_step() {
  setup_tracing();
  let pipeline = Pipeline::<CartContext, FlowError>::new(&[("initiate_payment", false, None)]);
  let err = pipeline.run(ContextData::new(CartContext::default())).await.unwrap_err();
  match err {
    FlowError::HandlerMissing { step_name } => assert_eq!(step_name, "initiate_payment"),
    other => panic!("expected HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn anyhow_errors_convert_into_handler_error() {
  setup_tracing();
  let mut pipeline = Pipeline::<CartContext, FlowError>::new(&[("price_cart", false, None)]);
  pipeline.on_root("price_cart", |_ctx: ContextData<CartContext>| {
    Box::pin(async move { Err::<PipelineControl, _>(anyhow::anyhow!("price lookup failed")) })
  });

  let err = pipeline.run(ContextData::new(CartContext::default())).await.unwrap_err();
  match err {
    FlowError::HandlerError { source } => assert_eq!(source.to_string(), "price lookup failed"),
    other => panic!("expected HandlerError, got {:?}", other),
  }
}

#[test]
fn wrapped_flow_error_is_not_nested() {
  let wrapped = anyhow::Error::new(FlowError::Internal("ledger offline".to_string()));
  match FlowError::from(wrapped) {
    FlowError::Internal(msg) => assert_eq!(msg, "ledger offline"),
    other => panic!("expected Internal, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn flow_error_as_pipeline_error_type() {
  setup_tracing();
  let mut pipeline = Pipeline::<CartContext, FlowError>::new(&[("settle_payment", false, None)]);
  pipeline.on_root("settle_payment", |ctx: ContextData<CartContext>| {
    Box::pin(async move {
      ctx.write().total_cents = 1999;
      Ok::<_, FlowError>(PipelineControl::Continue)
    })
  });

  let ctx = ContextData::new(CartContext::default());
  pipeline.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().total_cents, 1999);
}
