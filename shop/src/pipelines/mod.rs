// shop/src/pipelines/mod.rs

//! Storefront workflows as shopflow pipelines, one per context type.

use shopflow::{ContextData, Registry};

use crate::errors::{AppError, Result as AppResult};

pub mod checkout_pipeline;
pub mod contexts;
pub mod settlement_pipeline;
pub mod webhook_pipeline;

use contexts::{CheckoutCtxData, PaymentFailureCtxData, PaymentSuccessCtxData, WebhookCtxData};

/// Registers every application pipeline. Called once while building `AppState`.
pub fn register_all_pipelines(registry: &Registry<AppError>) {
  tracing::info!("Registering storefront pipelines...");

  checkout_pipeline::register_checkout_pipeline(registry);
  settlement_pipeline::register_settlement_pipelines(registry);
  webhook_pipeline::register_webhook_pipeline(registry);

  for (pipeline, steps) in [
    ("checkout", registry.step_names::<CheckoutCtxData>()),
    ("payment_success", registry.step_names::<PaymentSuccessCtxData>()),
    ("payment_failure", registry.step_names::<PaymentFailureCtxData>()),
    ("webhook", registry.step_names::<WebhookCtxData>()),
  ] {
    tracing::debug!(pipeline, steps = ?steps.unwrap_or_default(), "Pipeline steps.");
  }
  tracing::info!("All storefront pipelines registered.");
}

/// Runs the checkout pipeline and hands back the final context.
pub async fn run_checkout(registry: &Registry<AppError>, data: CheckoutCtxData) -> AppResult<CheckoutCtxData> {
  let ctx_data = ContextData::new(data);
  registry.run(ctx_data.clone()).await?;
  Ok(ctx_data.into_inner())
}
