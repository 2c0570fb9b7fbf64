// shop/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::pipelines::contexts::WebhookDisposition;
use crate::services::gateway::signature::SIGNATURE_HEADER;
use crate::services::reconciliation;
use crate::state::AppState;

/// Gateway push notifications. The body is taken as raw bytes because the signature
/// covers them exactly.
#[instrument(name = "handler::payment_webhook", skip_all, fields(body_len = body.len()))]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(SIGNATURE_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::to_string);

  let disposition = reconciliation::handle_webhook(&app_state, body, signature).await?;
  info!(?disposition, "Webhook processed.");
  let response = match disposition {
    WebhookDisposition::Ignored { .. } => json!({ "status": "ignored", "message": "Event not handled" }),
    WebhookDisposition::Handled { .. } | WebhookDisposition::Received => {
      json!({ "status": "success", "message": "Webhook received" })
    }
  };
  Ok(HttpResponse::Ok().json(response))
}
