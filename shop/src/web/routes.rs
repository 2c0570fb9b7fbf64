// shop/src/web/routes.rs

use actix_web::web;

use crate::errors::AppError;
use crate::web::handlers::{order_handlers, payment_handlers, webhook_handlers};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok", "service": "storefront" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  // Malformed JSON bodies get the same error shape as every other validation failure.
  let json_config = web::JsonConfig::default()
    .error_handler(|err, _req| AppError::Validation(format!("Invalid request body: {}", err)).into());

  cfg
    .app_data(json_config)
    .route("/health", web::get().to(health_check_handler))
    .service(
      web::scope("/api")
        .service(
          web::scope("/orders")
            .route("", web::post().to(order_handlers::create_order_handler))
            .route("", web::get().to(order_handlers::list_user_orders_handler))
            .route("/", web::get().to(order_handlers::list_user_orders_handler))
            .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
            .route(
              "/{order_id}/initiate-payment",
              web::post().to(order_handlers::initiate_payment_handler),
            )
            .route("/{order_id}/update-stock", web::post().to(order_handlers::update_stock_handler))
            .route("/{order_id}/cancel-stock", web::post().to(order_handlers::cancel_stock_handler)),
        )
        .service(
          web::scope("/payments")
            .route("/initialize", web::post().to(payment_handlers::initialize_payment_handler))
            .route("/verify/{reference}", web::get().to(payment_handlers::verify_payment_handler))
            .route("/webhook", web::post().to(webhook_handlers::payment_webhook_handler))
            .route(
              "/order/{order_number}",
              web::get().to(payment_handlers::get_order_by_number_handler),
            )
            .route(
              "/transactions/{reference}",
              web::get().to(payment_handlers::get_transaction_handler),
            )
            .route(
              "/user/{user_id}/orders",
              web::get().to(payment_handlers::get_user_orders_handler),
            )
            .route("/send-order-email", web::post().to(payment_handlers::send_order_email_handler)),
        ),
    );
}
