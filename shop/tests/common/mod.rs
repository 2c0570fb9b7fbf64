// shop/tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

use storefront::config::AppConfig;
use storefront::models::{PaymentMethod, Product, TransactionStatus};
use storefront::services::gateway::paystack::parse_webhook_body;
use storefront::services::gateway::{
  signature, to_minor_units, CardAuthorization, GatewayError, GatewayTransaction, InitializeRequest,
  InitializedPayment, PaymentGateway, WebhookEvent,
};
use storefront::services::notifications::{Mailer, OrderConfirmation};
use storefront::services::order_builder::CreateOrderRequest;
use storefront::services::references::ReferenceMinter;
use storefront::state::AppState;
use storefront::store::{MemoryStore, Store};

pub const TEST_SECRET: &str = "sk_test_storefront";

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitBehavior {
  Succeed,
  Reject,
  Unavailable,
}

enum VerifyScript {
  Report(GatewayTransaction),
  Unavailable,
}

/// Gateway double: initialize answers per `InitBehavior`, verify answers from a
/// per-reference script, signatures use `TEST_SECRET`.
pub struct FakeGateway {
  init_behavior: Mutex<InitBehavior>,
  verify_script: Mutex<HashMap<String, VerifyScript>>,
  init_delay: Mutex<Option<Duration>>,
  pub initialize_calls: AtomicUsize,
  pub verify_calls: AtomicUsize,
}

impl FakeGateway {
  pub fn new() -> Self {
    Self {
      init_behavior: Mutex::new(InitBehavior::Succeed),
      verify_script: Mutex::new(HashMap::new()),
      init_delay: Mutex::new(None),
      initialize_calls: AtomicUsize::new(0),
      verify_calls: AtomicUsize::new(0),
    }
  }

  pub fn set_init_behavior(&self, behavior: InitBehavior) {
    *self.init_behavior.lock() = behavior;
  }

  /// Holds every initialization for `delay` before answering.
  pub fn set_init_delay(&self, delay: Duration) {
    *self.init_delay.lock() = Some(delay);
  }

  pub fn script_verify(&self, transaction: GatewayTransaction) {
    self
      .verify_script
      .lock()
      .insert(transaction.reference.clone(), VerifyScript::Report(transaction));
  }

  pub fn script_verify_unavailable(&self, reference: &str) {
    self
      .verify_script
      .lock()
      .insert(reference.to_string(), VerifyScript::Unavailable);
  }

  pub fn verify_count(&self) -> usize {
    self.verify_calls.load(Ordering::SeqCst)
  }

  pub fn initialize_count(&self) -> usize {
    self.initialize_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
  async fn initialize(&self, request: &InitializeRequest) -> Result<InitializedPayment, GatewayError> {
    self.initialize_calls.fetch_add(1, Ordering::SeqCst);
    to_minor_units(request.amount)?;
    let delay = *self.init_delay.lock();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    let behavior = *self.init_behavior.lock();
    match behavior {
      InitBehavior::Succeed => Ok(InitializedPayment {
        authorization_url: format!("https://checkout.test/{}", request.reference),
        access_code: format!("AC_{}", request.reference),
        reference: request.reference.clone(),
      }),
      InitBehavior::Reject => Err(GatewayError::Rejected("Invalid email address".to_string())),
      InitBehavior::Unavailable => Err(GatewayError::Unavailable("request to payment gateway timed out".to_string())),
    }
  }

  async fn verify(&self, reference: &str) -> Result<GatewayTransaction, GatewayError> {
    self.verify_calls.fetch_add(1, Ordering::SeqCst);
    // Yield so concurrent reconciliations interleave.
    tokio::task::yield_now().await;
    match self.verify_script.lock().get(reference) {
      Some(VerifyScript::Report(tx)) => Ok(tx.clone()),
      Some(VerifyScript::Unavailable) => Err(GatewayError::Unavailable("request to payment gateway timed out".to_string())),
      None => Err(GatewayError::Rejected("Transaction reference not found".to_string())),
    }
  }

  fn validate_signature(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
    signature::verify(TEST_SECRET.as_bytes(), raw_body, signature)
  }

  fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
    parse_webhook_body(raw_body)
  }

  fn public_key(&self) -> Option<String> {
    Some("pk_test_storefront".to_string())
  }
}

/// Mailer double that keeps every message, optionally failing each send.
#[derive(Default)]
pub struct RecordingMailer {
  pub sent: Mutex<Vec<OrderConfirmation>>,
  pub fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn send_order_confirmation(&self, _sender: &str, message: &OrderConfirmation) -> anyhow::Result<String> {
    if self.fail {
      anyhow::bail!("smtp connection refused");
    }
    self.sent.lock().push(message.clone());
    Ok(format!("test_{}", Uuid::new_v4()))
  }
}

impl RecordingMailer {
  pub fn sent_count(&self) -> usize {
    self.sent.lock().len()
  }

  /// Waits for background sends to land, up to one second.
  pub async fn wait_for(&self, count: usize) -> usize {
    for _ in 0..100 {
      if self.sent_count() >= count {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    self.sent_count()
  }
}

pub fn test_config(overrides: &[(&str, &str)]) -> AppConfig {
  let mut values: HashMap<&str, &str> = HashMap::from([
    ("PAYSTACK_SECRET_KEY", TEST_SECRET),
    ("PAYSTACK_PUBLIC_KEY", "pk_test_storefront"),
    ("FRONTEND_URL", "https://shop.test"),
    ("NOTIFICATION_TIMEOUT_SECS", "2"),
    ("BANK_NAME", "Test Bank"),
    ("BANK_ACCOUNT_NAME", "Storefront Test"),
    ("BANK_ACCOUNT_NUMBER", "0123456789"),
  ]);
  for (key, value) in overrides {
    values.insert(*key, *value);
  }
  AppConfig::from_map(&values).expect("test config")
}

pub struct TestApp {
  pub state: AppState,
  pub store: MemoryStore,
  pub gateway: Arc<FakeGateway>,
  pub mailer: Arc<RecordingMailer>,
}

pub fn test_app() -> TestApp {
  test_app_with(test_config(&[]), None)
}

pub fn test_app_with(config: AppConfig, minter: Option<ReferenceMinter>) -> TestApp {
  setup_tracing();
  let store = MemoryStore::new();
  let gateway = Arc::new(FakeGateway::new());
  let mailer = Arc::new(RecordingMailer::default());
  let mut state = AppState::new(
    config,
    Arc::new(store.clone()),
    gateway.clone(),
    mailer.clone(),
    None,
  );
  if let Some(minter) = minter {
    state = state.with_minter(minter);
  }
  TestApp {
    state,
    store,
    gateway,
    mailer,
  }
}

/// Minter that hands out `suffixes` in order, then random ones.
pub fn scripted_minter(suffixes: &[&str]) -> ReferenceMinter {
  let queue: Arc<Mutex<VecDeque<String>>> =
    Arc::new(Mutex::new(suffixes.iter().map(|s| s.to_string()).collect()));
  ReferenceMinter::from_source(Arc::new(move || {
    queue
      .lock()
      .pop_front()
      .unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..8].to_string())
  }))
}

pub async fn add_product(store: &MemoryStore, name: &str, price: i64, stock: i32) -> Product {
  let product = Product::new(name, Decimal::from(price), stock);
  assert!(store.insert_product(&product).await.unwrap());
  product
}

/// A valid single-line request for `quantity` of `product_id`.
pub fn order_request(product_id: Uuid, quantity: i32, method: PaymentMethod) -> CreateOrderRequest {
  order_request_lines(&[(product_id, quantity)], method)
}

pub fn order_request_lines(lines: &[(Uuid, i32)], method: PaymentMethod) -> CreateOrderRequest {
  let items: Vec<_> = lines
    .iter()
    .map(|(product_id, quantity)| json!({ "product_id": product_id, "quantity": quantity }))
    .collect();
  let mut request: CreateOrderRequest = serde_json::from_value(json!({
    "cart_items": items,
    "shipping_address": { "street": "12 Admiralty Way", "city": "Lekki", "state": "Lagos", "country": "Nigeria" },
    "email": "ada@example.com",
    "customer_name": "Ada Obi",
    "customer_phone": "+2348012345678",
  }))
  .expect("valid request json");
  request.payment_method = method;
  request
}

/// Transaction as the gateway reports it after a completed card payment.
pub fn reported(reference: &str, amount: i64, status: TransactionStatus) -> GatewayTransaction {
  let now = Utc::now();
  GatewayTransaction {
    gateway_id: Some("4099260516".to_string()),
    reference: reference.to_string(),
    status,
    raw_status: status.as_str().to_string(),
    amount: Decimal::from(amount),
    currency: "NGN".to_string(),
    channel: Some("card".to_string()),
    gateway_response: Some(if status == TransactionStatus::Success { "Approved" } else { "Declined" }.to_string()),
    customer_email: Some("ada@example.com".to_string()),
    customer_code: Some("CUS_test".to_string()),
    ip_address: None,
    authorization: CardAuthorization {
      authorization_code: Some("AUTH_test".to_string()),
      last4: Some("4081".to_string()),
      card_type: Some("visa".to_string()),
      bank: Some("TEST BANK".to_string()),
    },
    transaction_date: Some(now),
    paid_at: (status == TransactionStatus::Success).then_some(now),
  }
}

/// Webhook body for a charge event, amount in major units.
pub fn charge_webhook(event: &str, reference: &str, amount: i64, status: &str) -> Vec<u8> {
  json!({
    "event": event,
    "data": {
      "id": 4099260516u64,
      "reference": reference,
      "status": status,
      "amount": amount * 100,
      "currency": "NGN",
      "channel": "card",
      "gateway_response": if status == "success" { "Approved" } else { "Declined" },
      "paid_at": "2025-06-01T10:15:30.000Z",
      "customer": { "email": "ada@example.com", "customer_code": "CUS_test" },
      "authorization": { "authorization_code": "AUTH_test", "last4": "4081", "card_type": "visa", "bank": "TEST BANK" }
    }
  })
  .to_string()
  .into_bytes()
}

pub fn sign(body: &[u8]) -> String {
  signature::sign(TEST_SECRET.as_bytes(), body)
}
