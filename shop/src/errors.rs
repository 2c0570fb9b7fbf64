// shop/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use shopflow::FlowError;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Insufficient stock for '{product_name}': requested {requested}, available {available}")]
  InsufficientStock {
    product_id: Uuid,
    product_name: String,
    requested: i32,
    available: i32,
  },

  #[error("Payment initialization failed: {0}")]
  PaymentInitializationFailed(String),

  #[error("Payment gateway unavailable: {0}")]
  GatewayUnavailable(String),

  #[error("Payment already in progress: {0}")]
  PaymentInProgress(String),

  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<StoreError> for AppError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::NotFound(what) => AppError::NotFound(what),
      StoreError::Backend(e) => AppError::Sqlx(e),
      other => AppError::Internal(other.to_string()),
    }
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<AppError>() {
      Ok(app_err) => app_err,
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
        Err(other) => AppError::Internal(other.to_string()),
      },
    }
  }
}

impl AppError {
  /// Whether the caller may retry the same request unchanged.
  pub fn is_retryable(&self) -> bool {
    matches!(self, AppError::GatewayUnavailable(_) | AppError::PaymentInProgress(_))
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::InsufficientStock { .. } | AppError::PaymentInProgress(_) => StatusCode::CONFLICT,
      AppError::PaymentInitializationFailed(_) => StatusCode::PAYMENT_REQUIRED,
      AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::Config(_)
      | AppError::Sqlx(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with client error");
    }

    let body = match self {
      AppError::Validation(m) | AppError::NotFound(m) | AppError::Unauthorized(m) => json!({ "error": m }),
      AppError::InsufficientStock {
        product_id,
        product_name,
        requested,
        available,
      } => json!({
        "error": "Insufficient stock",
        "detail": {
          "product_id": product_id,
          "product_name": product_name,
          "requested": requested,
          "available": available,
        }
      }),
      AppError::PaymentInitializationFailed(m) => json!({ "error": "Payment initialization failed", "detail": m }),
      AppError::GatewayUnavailable(m) => {
        json!({ "error": "Payment service unavailable", "detail": m, "retryable": true })
      }
      AppError::PaymentInProgress(m) => json!({ "error": "Payment already in progress", "detail": m, "retryable": true }),
      AppError::Config(m) => json!({ "error": "Configuration issue", "detail": m }),
      AppError::Sqlx(_) => json!({ "error": "Database operation failed" }),
      AppError::Workflow { source } => json!({ "error": "Workflow processing error", "detail": source.to_string() }),
      AppError::Internal(m) => json!({ "error": "An internal error occurred", "detail": m }),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
