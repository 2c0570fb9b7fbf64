// core/tests/common/mod.rs
#![allow(dead_code)]

use once_cell::sync::Lazy;
use shopflow::{ContextData, FlowError, Handler, PipelineControl};
use tracing::Level;

/// A small checkout-shaped context shared by the engine tests.
#[derive(Clone, Debug, Default)]
pub struct CartContext {
  pub line_count: i32,
  pub total_cents: i64,
  pub notes: String,
  pub steps_executed: Vec<String>,
  pub stop_at: Option<String>,
  pub order_persisted: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("workflow error: {0}")]
  Flow(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(err: FlowError) -> Self {
    TestError::Flow(format!("{:?}", err))
  }
}

/// Handler that records its name, adds one line worth `cents` and honours `stop_at`.
pub fn add_line_handler(step_name: &'static str, cents: i64) -> Handler<CartContext, TestError> {
  Box::new(move |ctx: ContextData<CartContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.line_count += 1;
      guard.total_cents += cents;
      guard.steps_executed.push(step_name.to_string());
      tracing::debug!(target: "test_handlers", step = step_name, total = guard.total_cents, "line added");
      if guard.stop_at.as_deref() == Some(step_name) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn failing_handler(step_name: &'static str, message: &'static str) -> Handler<CartContext, TestError> {
  Box::new(move |ctx: ContextData<CartContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      tracing::warn!(target: "test_handlers", step = step_name, "failing: {}", message);
      Err(TestError::Handler(message.to_string()))
    })
  })
}

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
