// shop/src/config.rs

use crate::errors::{AppError, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Static settlement details returned for bank-transfer orders.
#[derive(Debug, Clone)]
pub struct BankTransferConfig {
  pub bank_name: String,
  pub account_name: String,
  pub account_number: String,
}

#[derive(Debug, Clone)]
pub struct PaystackConfig {
  pub base_url: String,
  pub secret_key: String,
  pub public_key: String,
  pub timeout: Duration,
}

/// PostgREST-style secondary inventory store.
#[derive(Debug, Clone)]
pub struct InventoryMirrorConfig {
  pub url: String,
  pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// `None` runs the service on the in-memory store.
  pub database_url: Option<String>,
  pub run_migrations: bool,
  pub seed_db: bool,
  pub json_logs: bool,

  pub frontend_url: String,
  pub default_currency: String,
  pub order_number_prefix: String,
  /// Upper bound on order-number / reference collision retries.
  pub max_number_attempts: u32,

  pub paystack: PaystackConfig,
  pub bank_transfer: BankTransferConfig,

  pub email_sender: String,
  pub notification_timeout: Duration,

  pub inventory_mirror: Option<InventoryMirrorConfig>,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Builds the configuration from any key lookup. `from_env` passes the process environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| lookup(var_name).filter(|v| !v.trim().is_empty());
    let get_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|| default.to_string());

    let server_host = get_or("SERVER_HOST", "127.0.0.1");
    let server_port = parse_var("SERVER_PORT", &get_or("SERVER_PORT", "8080"))?;
    let database_url = get_env("DATABASE_URL");
    let run_migrations = parse_var("RUN_MIGRATIONS", &get_or("RUN_MIGRATIONS", "false"))?;
    let seed_db = parse_var("SEED_DB", &get_or("SEED_DB", "false"))?;
    let json_logs = get_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json");

    let frontend_url = get_or("FRONTEND_URL", "http://localhost:3000");
    let default_currency = get_or("DEFAULT_CURRENCY", "NGN");
    let order_number_prefix = get_or("ORDER_NUMBER_PREFIX", "ORD");
    let max_number_attempts = parse_var("ORDER_NUMBER_MAX_ATTEMPTS", &get_or("ORDER_NUMBER_MAX_ATTEMPTS", "5"))?;
    if max_number_attempts == 0 {
      return Err(AppError::Config("ORDER_NUMBER_MAX_ATTEMPTS must be at least 1".to_string()));
    }

    let gateway_timeout_secs: u64 = parse_var("GATEWAY_TIMEOUT_SECS", &get_or("GATEWAY_TIMEOUT_SECS", "30"))?;
    let paystack = PaystackConfig {
      base_url: get_or("PAYSTACK_BASE_URL", "https://api.paystack.co")
        .trim_end_matches('/')
        .to_string(),
      secret_key: get_env("PAYSTACK_SECRET_KEY").unwrap_or_default(),
      public_key: get_env("PAYSTACK_PUBLIC_KEY").unwrap_or_default(),
      timeout: Duration::from_secs(gateway_timeout_secs),
    };
    if paystack.secret_key.is_empty() {
      tracing::warn!("PAYSTACK_SECRET_KEY is not set; gateway calls and webhook signatures will be rejected.");
    }

    let bank_transfer = BankTransferConfig {
      bank_name: get_or("BANK_NAME", "First Bank"),
      account_name: get_or("BANK_ACCOUNT_NAME", "Storefront Ltd"),
      account_number: get_or("BANK_ACCOUNT_NUMBER", "0000000000"),
    };

    let email_sender = get_or("EMAIL_SENDER", "noreply@example.com");
    let notification_timeout_secs: u64 =
      parse_var("NOTIFICATION_TIMEOUT_SECS", &get_or("NOTIFICATION_TIMEOUT_SECS", "10"))?;

    let inventory_mirror = match (get_env("INVENTORY_MIRROR_URL"), get_env("INVENTORY_MIRROR_KEY")) {
      (Some(url), Some(api_key)) => Some(InventoryMirrorConfig {
        url: url.trim_end_matches('/').to_string(),
        api_key,
      }),
      (Some(_), None) => {
        return Err(AppError::Config(
          "INVENTORY_MIRROR_URL is set but INVENTORY_MIRROR_KEY is missing".to_string(),
        ))
      }
      _ => None,
    };

    tracing::info!(
      database = database_url.is_some(),
      mirror = inventory_mirror.is_some(),
      "Application configuration loaded."
    );

    Ok(Self {
      server_host,
      server_port,
      database_url,
      run_migrations,
      seed_db,
      json_logs,
      frontend_url,
      default_currency,
      order_number_prefix,
      max_number_attempts,
      paystack,
      bank_transfer,
      email_sender,
      notification_timeout: Duration::from_secs(notification_timeout_secs),
      inventory_mirror,
    })
  }

  /// Configuration from a fixed map; unspecified keys take their defaults.
  pub fn from_map(values: &HashMap<&str, &str>) -> Result<Self> {
    Self::from_lookup(|key| values.get(key).map(|v| v.to_string()))
  }

  pub fn callback_url(&self) -> String {
    format!("{}/order-confirmation", self.frontend_url.trim_end_matches('/'))
  }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", name, raw, e)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_apply_when_keys_are_absent() {
    let cfg = AppConfig::from_map(&HashMap::new()).unwrap();
    assert_eq!(cfg.server_port, 8080);
    assert!(cfg.database_url.is_none());
    assert_eq!(cfg.order_number_prefix, "ORD");
    assert_eq!(cfg.paystack.timeout, Duration::from_secs(30));
    assert_eq!(cfg.max_number_attempts, 5);
    assert!(cfg.inventory_mirror.is_none());
    assert_eq!(cfg.callback_url(), "http://localhost:3000/order-confirmation");
  }

  #[test]
  fn bad_numbers_are_config_errors() {
    let values = HashMap::from([("SERVER_PORT", "eighty")]);
    match AppConfig::from_map(&values) {
      Err(AppError::Config(msg)) => assert!(msg.contains("SERVER_PORT")),
      other => panic!("expected config error, got {:?}", other.map(|_| ())),
    }
  }

  #[test]
  fn mirror_requires_both_keys() {
    let values = HashMap::from([("INVENTORY_MIRROR_URL", "https://mirror.example")]);
    assert!(AppConfig::from_map(&values).is_err());

    let values = HashMap::from([
      ("INVENTORY_MIRROR_URL", "https://mirror.example/"),
      ("INVENTORY_MIRROR_KEY", "anon"),
    ]);
    let cfg = AppConfig::from_map(&values).unwrap();
    assert_eq!(cfg.inventory_mirror.unwrap().url, "https://mirror.example");
  }
}
