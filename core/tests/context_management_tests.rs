// core/tests/context_management_tests.rs
mod common;

use common::*;
use shopflow::{ContextData, FlowError, Pipeline, PipelineControl};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn later_steps_see_earlier_writes() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<CartContext, TestError>::new(&[("price_cart", false, None), ("apply_total", false, None)]);

  pipeline.on_root("price_cart", |ctx: ContextData<CartContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.total_cents = 2500;
      guard.notes = "priced".to_string();
      Ok::<_, FlowError>(PipelineControl::Continue)
    })
  });
  pipeline.on_root("apply_total", |ctx: ContextData<CartContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      assert_eq!(guard.total_cents, 2500);
      guard.total_cents += 500;
      guard.notes.push_str(",shipping");
      Ok::<_, FlowError>(PipelineControl::Continue)
    })
  });

  let ctx = ContextData::new(CartContext::default());
  pipeline.run(ctx.clone()).await.unwrap();

  let guard = ctx.read();
  assert_eq!(guard.total_cents, 3000);
  assert_eq!(guard.notes, "priced,shipping");
}

#[tokio::test]
#[serial]
async fn clones_share_one_value() {
  setup_tracing();
  let original = ContextData::new(CartContext {
    line_count: 1,
    ..Default::default()
  });
  let cloned = original.clone();

  original.update(|c| c.line_count = 5);
  assert_eq!(cloned.read().line_count, 5);

  {
    cloned.write().line_count = 10;
  }
  assert_eq!(*original.map_read(|c| &c.line_count), 10);
}

#[tokio::test]
#[serial]
async fn guards_are_released_before_awaiting() {
  setup_tracing();
  let ctx = ContextData::new(CartContext::default());

  let handler = {
    let ctx = ctx.clone();
    async move {
      let current = { ctx.read().total_cents };
      tokio::time::sleep(std::time::Duration::from_millis(1)).await;
      {
        ctx.write().total_cents = current + 1;
      }
    }
  };

  tokio::spawn(handler).await.unwrap();
  assert_eq!(ctx.read().total_cents, 1);
}

#[test]
fn into_inner_returns_value_even_when_shared() {
  let ctx = ContextData::new(CartContext {
    total_cents: 42,
    ..Default::default()
  });
  let other = ctx.clone();
  assert_eq!(ctx.into_inner().total_cents, 42);
  assert_eq!(other.into_inner().total_cents, 42);
}
