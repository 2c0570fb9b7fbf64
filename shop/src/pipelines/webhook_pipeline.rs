// shop/src/pipelines/webhook_pipeline.rs

use shopflow::{ContextData, Pipeline, PipelineControl, Registry};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::{WebhookCtxData, WebhookDisposition};
use crate::services::gateway::WebhookEvent;
use crate::services::reconciliation;

pub fn build_webhook_pipeline() -> Pipeline<WebhookCtxData, AppError> {
  let mut p = Pipeline::<WebhookCtxData, AppError>::new(&[
    ("verify_webhook_signature", false, None),
    ("parse_webhook_payload", false, None),
    (
      "route_webhook_event",
      false,
      Some(Arc::new(|ctx: ContextData<WebhookCtxData>| ctx.read().event.is_none())),
    ),
    ("acknowledge_webhook_receipt", true, None),
  ]);

  // Nothing in the body is looked at before the signature checks out.
  p.on_root("verify_webhook_signature", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let guard = ctx_data.read();
      let valid = guard
        .app_state
        .gateway
        .validate_signature(&guard.raw_body, guard.signature.as_deref());
      if !valid {
        warn!(
          has_signature = guard.signature.is_some(),
          body_len = guard.raw_body.len(),
          "Webhook rejected: invalid signature."
        );
        return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("parse_webhook_payload", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let mut guard = ctx_data.write();
      let parsed = guard.app_state.gateway.parse_webhook(&guard.raw_body);
      match parsed {
        Ok(event) => {
          info!(event = event.name(), "Webhook event received.");
          guard.event = Some(event);
        }
        Err(e) => {
          warn!(error = %e, "Signed webhook body could not be parsed; acknowledging without action.");
          guard.disposition = WebhookDisposition::Ignored {
            reason: "Malformed payload".to_string(),
          };
        }
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Persistence failures propagate so the gateway sees a 5xx and redelivers.
  p.on_root("route_webhook_event", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let (app_state, event) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.event.clone())
      };
      let disposition = match event {
        Some(WebhookEvent::ChargeSuccess(transaction)) => WebhookDisposition::Handled {
          outcome: reconciliation::apply_success(&app_state, transaction).await?,
        },
        Some(WebhookEvent::ChargeFailed(transaction)) => WebhookDisposition::Handled {
          outcome: reconciliation::apply_failure(&app_state, transaction).await?,
        },
        Some(WebhookEvent::Other(name)) => {
          info!(event = %name, "Webhook event not handled.");
          WebhookDisposition::Ignored {
            reason: format!("Event {} not handled", name),
          }
        }
        None => WebhookDisposition::Ignored {
          reason: "No event".to_string(),
        },
      };
      ctx_data.write().disposition = disposition;
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("acknowledge_webhook_receipt", |ctx_data: ContextData<WebhookCtxData>| {
    Box::pin(async move {
      let guard = ctx_data.read();
      let event = guard.event.as_ref().map(WebhookEvent::name).unwrap_or("none");
      info!(event, disposition = ?guard.disposition, "Webhook acknowledged.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p
}

pub fn register_webhook_pipeline(registry: &Registry<AppError>) {
  registry.register_pipeline(build_webhook_pipeline());
}
