// shop/src/main.rs

use actix_web::{web as actix_data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use storefront::config::AppConfig;
use storefront::services::gateway::{PaymentGateway, PaystackGateway};
use storefront::services::inventory::{HttpInventoryMirror, InventoryMirror};
use storefront::services::notifications::LoggingMailer;
use storefront::state::AppState;
use storefront::store::{seed_demo_products, MemoryStore, PgStore, Store};
use storefront::web::configure_app_routes;

fn init_tracing(json_logs: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  if json_logs {
    builder.json().init();
  } else {
    builder.init();
  }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
  tracing::error!(error = %err, "{}", context);
  io::Error::other(format!("{}: {}", context, err))
}

async fn open_store(config: &AppConfig) -> io::Result<Arc<dyn Store>> {
  let Some(database_url) = config.database_url.as_deref() else {
    tracing::warn!("DATABASE_URL is not set; using the in-memory store. Data will not survive a restart.");
    return Ok(Arc::new(MemoryStore::new()));
  };

  let pool = PgPoolOptions::new()
    .max_connections(10)
    .connect(database_url)
    .await
    .map_err(|e| startup_error("Failed to connect to the database", e))?;
  tracing::info!("Successfully connected to the database.");

  let store = PgStore::new(pool);
  if config.run_migrations {
    store
      .run_migrations()
      .await
      .map_err(|e| startup_error("Database migrations failed", e))?;
    tracing::info!("Database migrations applied.");
  }
  Ok(Arc::new(store))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
  // Logging is configured from the environment before the rest of the config is read,
  // so config warnings are not lost.
  dotenvy::dotenv().ok();
  let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
  init_tracing(json_logs);

  tracing::info!("Starting storefront server...");

  let app_config = AppConfig::from_env().map_err(|e| startup_error("Failed to load application configuration", e))?;

  let store = open_store(&app_config).await?;
  if app_config.seed_db {
    seed_demo_products(store.as_ref())
      .await
      .map_err(|e| startup_error("Failed to seed database", e))?;
  }

  let gateway: Arc<dyn PaymentGateway> = Arc::new(
    PaystackGateway::new(&app_config.paystack).map_err(|e| startup_error("Payment gateway setup failed", e))?,
  );
  let mirror: Option<Arc<dyn InventoryMirror>> = match app_config.inventory_mirror.as_ref() {
    Some(mirror_config) => Some(Arc::new(
      HttpInventoryMirror::new(mirror_config, app_config.paystack.timeout)
        .map_err(|e| startup_error("Inventory mirror setup failed", e))?,
    )),
    None => None,
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let app_state = AppState::new(app_config, store, gateway, Arc::new(LoggingMailer), mirror);

  tracing::info!("Attempting to bind server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
