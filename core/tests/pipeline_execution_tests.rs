// core/tests/pipeline_execution_tests.rs
mod common;

use common::*;
use shopflow::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult};
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn steps_run_in_declared_order() {
  setup_tracing();
  let mut pipeline = Pipeline::<CartContext, TestError>::new(&[
    ("validate_cart", false, None),
    ("price_cart", false, None),
    ("persist_order", false, None),
  ]);
  pipeline.on_root("validate_cart", add_line_handler("validate_cart", 100));
  pipeline.on_root("price_cart", add_line_handler("price_cart", 250));
  pipeline.on_root("persist_order", add_line_handler("persist_order", 50));

  let ctx = ContextData::new(CartContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  let guard = ctx.read();
  assert_eq!(guard.line_count, 3);
  assert_eq!(guard.total_cents, 400);
  assert_eq!(guard.steps_executed, vec!["validate_cart", "price_cart", "persist_order"]);
}

#[tokio::test]
#[serial]
async fn stop_ends_the_run_without_error() {
  setup_tracing();
  let mut pipeline = Pipeline::<CartContext, TestError>::new(&[
    ("resolve_order", false, None),
    ("guard_already_paid", false, None),
    ("settle_payment", false, None),
  ]);
  pipeline.on_root("resolve_order", add_line_handler("resolve_order", 1));
  pipeline.on_root("guard_already_paid", |ctx: ContextData<CartContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push("guard_already_paid".to_string());
      Ok::<_, FlowError>(PipelineControl::Stop)
    })
  });
  pipeline.on_root("settle_payment", add_line_handler("settle_payment", 1000));

  let ctx = ContextData::new(CartContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Stopped);
  let guard = ctx.read();
  assert_eq!(guard.total_cents, 1);
  assert_eq!(guard.steps_executed, vec!["resolve_order", "guard_already_paid"]);
}

#[tokio::test]
#[serial]
async fn stop_from_data_driven_handler() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<CartContext, TestError>::new(&[("first", false, None), ("second", false, None), ("third", false, None)]);
  pipeline.on_root("first", add_line_handler("first", 1));
  pipeline.on_root("second", add_line_handler("second", 1));
  pipeline.on_root("third", add_line_handler("third", 1));

  let ctx = ContextData::new(CartContext {
    stop_at: Some("second".to_string()),
    ..Default::default()
  });
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Stopped);
  assert_eq!(ctx.read().steps_executed, vec!["first", "second"]);
}

#[tokio::test]
#[serial]
async fn required_step_error_aborts_the_run() {
  setup_tracing();
  let mut pipeline = Pipeline::<CartContext, TestError>::new(&[
    ("validate_cart", false, None),
    ("price_cart", false, None),
    ("persist_order", false, None),
  ]);
  pipeline.on_root("validate_cart", add_line_handler("validate_cart", 10));
  pipeline.on_root("price_cart", failing_handler("price_cart", "product is inactive"));
  pipeline.on_root("persist_order", add_line_handler("persist_order", 10));

  let ctx = ContextData::new(CartContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap_err(), TestError::Handler("product is inactive".to_string()));
  let guard = ctx.read();
  assert_eq!(guard.total_cents, 10);
  assert_eq!(guard.steps_executed, vec!["validate_cart", "price_cart"]);
}

#[tokio::test]
#[serial]
async fn optional_step_error_is_logged_and_skipped() {
  setup_tracing();
  let mut pipeline = Pipeline::<CartContext, TestError>::new(&[
    ("settle_payment", false, None),
    ("mirror_inventory", true, None),
    ("dispatch_confirmation", true, None),
  ]);
  pipeline.on_root("settle_payment", add_line_handler("settle_payment", 500));
  pipeline.on_root("mirror_inventory", failing_handler("mirror_inventory", "mirror unreachable"));
  pipeline.after_root("mirror_inventory", add_line_handler("mirror_after", 1));
  pipeline.on_root("dispatch_confirmation", add_line_handler("dispatch_confirmation", 0));

  let ctx = ContextData::new(CartContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  // The failing step's remaining handlers are abandoned; later steps still run.
  assert_eq!(
    ctx.read().steps_executed,
    vec!["settle_payment", "mirror_inventory", "dispatch_confirmation"]
  );
}

#[tokio::test]
#[serial]
async fn skip_if_condition_bypasses_step() {
  setup_tracing();
  let mut pipeline = Pipeline::<CartContext, TestError>::new(&[
    ("price_cart", false, None),
    (
      "persist_order",
      false,
      Some(Arc::new(|ctx: ContextData<CartContext>| ctx.read().order_persisted)),
    ),
    ("initiate_payment", false, None),
  ]);
  pipeline.on_root("price_cart", |ctx: ContextData<CartContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.order_persisted = true;
      guard.steps_executed.push("price_cart".to_string());
      Ok::<_, TestError>(PipelineControl::Continue)
    })
  });
  pipeline.on_root("persist_order", add_line_handler("persist_order", 1));
  pipeline.on_root("initiate_payment", add_line_handler("initiate_payment", 1));

  let ctx = ContextData::new(CartContext::default());
  assert_eq!(pipeline.run(ctx.clone()).await.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["price_cart", "initiate_payment"]);
}

#[tokio::test]
#[serial]
async fn required_step_without_handlers_fails() {
  setup_tracing();
  let pipeline = Pipeline::<CartContext, TestError>::new(&[("persist_order", false, None)]);

  let result = pipeline.run(ContextData::new(CartContext::default())).await;

  match result {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("persist_order"));
    }
    other => panic!("expected HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn optional_step_without_handlers_is_skipped() {
  setup_tracing();
  let pipeline = Pipeline::<CartContext, TestError>::new(&[("mirror_inventory", true, None)]);
  let result = pipeline.run(ContextData::new(CartContext::default())).await;
  assert_eq!(result.unwrap(), PipelineResult::Completed);
}

#[tokio::test]
#[serial]
async fn before_on_after_run_in_phase_order() {
  setup_tracing();
  let mut pipeline = Pipeline::<CartContext, TestError>::new(&[("settle_payment", false, None)]);
  pipeline.after_root("settle_payment", add_line_handler("after", 1));
  pipeline.on_root("settle_payment", add_line_handler("on_first", 1));
  pipeline.before_root("settle_payment", add_line_handler("before", 1));
  pipeline.on_root("settle_payment", add_line_handler("on_second", 1));

  let ctx = ContextData::new(CartContext::default());
  pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().steps_executed, vec!["before", "on_first", "on_second", "after"]);
}

#[test]
#[should_panic(expected = "already defined")]
fn duplicate_step_names_are_rejected() {
  let _pipeline =
    Pipeline::<CartContext, TestError>::new(&[("validate_cart", false, None), ("validate_cart", true, None)]);
}

#[test]
#[should_panic(expected = "not defined")]
fn registering_on_unknown_step_panics() {
  let mut pipeline = Pipeline::<CartContext, TestError>::new(&[("validate_cart", false, None)]);
  pipeline.on_root("validate_kart", add_line_handler("validate_kart", 1));
}
