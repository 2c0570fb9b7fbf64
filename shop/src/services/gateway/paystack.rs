// shop/src/services/gateway/paystack.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{
  from_minor_units, signature, to_minor_units, CardAuthorization, GatewayError, GatewayTransaction,
  InitializeRequest, InitializedPayment, PaymentGateway, WebhookEvent,
};
use crate::config::PaystackConfig;
use crate::models::TransactionStatus;

/// Paystack REST adapter: bearer secret key, JSON bodies, amounts in kobo.
pub struct PaystackGateway {
  client: Client,
  base_url: String,
  secret_key: String,
  public_key: String,
}

impl PaystackGateway {
  pub fn new(config: &PaystackConfig) -> Result<Self, GatewayError> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| GatewayError::NotConfigured(format!("HTTP client: {}", e)))?;
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      secret_key: config.secret_key.clone(),
      public_key: config.public_key.clone(),
    })
  }

  fn ensure_configured(&self) -> Result<(), GatewayError> {
    if self.secret_key.is_empty() {
      return Err(GatewayError::NotConfigured("PAYSTACK_SECRET_KEY is not set".to_string()));
    }
    Ok(())
  }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
  status: bool,
  #[serde(default)]
  message: String,
  data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
  email: &'a str,
  /// Kobo.
  amount: i64,
  currency: &'a str,
  reference: &'a str,
  callback_url: &'a str,
  metadata: &'a Value,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
  authorization_url: String,
  access_code: String,
  reference: String,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
  #[serde(default)]
  id: Option<Value>,
  reference: String,
  #[serde(default)]
  status: String,
  #[serde(default)]
  amount: i64,
  #[serde(default)]
  currency: Option<String>,
  #[serde(default)]
  channel: Option<String>,
  #[serde(default)]
  gateway_response: Option<String>,
  #[serde(default)]
  ip_address: Option<String>,
  #[serde(default)]
  customer: Option<CustomerData>,
  #[serde(default)]
  authorization: Option<AuthorizationData>,
  #[serde(default, alias = "created_at", alias = "createdAt")]
  transaction_date: Option<String>,
  #[serde(default, alias = "paidAt")]
  paid_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerData {
  #[serde(default)]
  email: Option<String>,
  #[serde(default)]
  customer_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthorizationData {
  #[serde(default)]
  authorization_code: Option<String>,
  #[serde(default)]
  last4: Option<String>,
  #[serde(default)]
  card_type: Option<String>,
  #[serde(default)]
  bank: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
  event: String,
  #[serde(default)]
  data: Option<Value>,
}

/// Gateway timestamps come as RFC 3339 or as naive date-times that are taken as UTC.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
  let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
      return Some(naive.and_utc());
    }
  }
  match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    Ok(date) => date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()),
    Err(_) => {
      debug!(timestamp = %raw, "Unparseable gateway timestamp ignored.");
      None
    }
  }
}

impl From<TransactionData> for GatewayTransaction {
  fn from(data: TransactionData) -> Self {
    let gateway_id = data.id.and_then(|id| match id {
      Value::Null => None,
      Value::String(s) => Some(s),
      other => Some(other.to_string()),
    });
    let customer = data.customer.unwrap_or_default();
    let authorization = data.authorization.unwrap_or_default();
    GatewayTransaction {
      gateway_id,
      status: TransactionStatus::from_gateway(&data.status),
      raw_status: data.status,
      reference: data.reference,
      amount: from_minor_units(data.amount),
      currency: data.currency.unwrap_or_else(|| "NGN".to_string()),
      channel: data.channel,
      gateway_response: data.gateway_response,
      customer_email: customer.email,
      customer_code: customer.customer_code,
      ip_address: data.ip_address,
      authorization: CardAuthorization {
        authorization_code: authorization.authorization_code,
        last4: authorization.last4,
        card_type: authorization.card_type,
        bank: authorization.bank,
      },
      transaction_date: parse_timestamp(data.transaction_date.as_deref()),
      paid_at: parse_timestamp(data.paid_at.as_deref()),
    }
  }
}

/// Parses the `data` object of a verify response or charge webhook.
pub fn parse_transaction(data: Value) -> Result<GatewayTransaction, GatewayError> {
  let data: TransactionData =
    serde_json::from_value(data).map_err(|e| GatewayError::Malformed(format!("transaction data: {}", e)))?;
  if data.reference.trim().is_empty() {
    return Err(GatewayError::Malformed("transaction data has an empty reference".to_string()));
  }
  Ok(data.into())
}

/// Parses a webhook body `{event, data}`. Only charge events need a parseable `data`.
pub fn parse_webhook_body(raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
  let WebhookBody { event, data } =
    serde_json::from_slice(raw_body).map_err(|e| GatewayError::Malformed(format!("webhook body: {}", e)))?;
  let charge_data = |data: Option<Value>| {
    data
      .ok_or_else(|| GatewayError::Malformed(format!("{} webhook without data", event)))
      .and_then(parse_transaction)
  };
  match event.as_str() {
    "charge.success" => Ok(WebhookEvent::ChargeSuccess(charge_data(data)?)),
    "charge.failed" => Ok(WebhookEvent::ChargeFailed(charge_data(data)?)),
    _ => Ok(WebhookEvent::Other(event.clone())),
  }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
  if err.is_timeout() {
    GatewayError::Unavailable("request to payment gateway timed out".to_string())
  } else if err.is_connect() {
    GatewayError::Unavailable(format!("could not reach payment gateway: {}", err))
  } else {
    GatewayError::Unavailable(err.to_string())
  }
}

/// Reads a gateway response into its `data`. 5xx is `Unavailable`; `status: false`
/// (whatever the HTTP code) is `Rejected` with the gateway's message.
async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
  let http_status = response.status();
  if http_status.is_server_error() {
    return Err(GatewayError::Unavailable(format!("payment gateway answered {}", http_status)));
  }
  let bytes = response.bytes().await.map_err(transport_error)?;
  let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
    Ok(envelope) => envelope,
    Err(e) if http_status.is_client_error() => {
      return Err(GatewayError::Rejected(format!("payment gateway answered {}: {}", http_status, e)));
    }
    Err(e) => return Err(GatewayError::Malformed(e.to_string())),
  };
  if !envelope.status {
    return Err(GatewayError::Rejected(if envelope.message.is_empty() {
      format!("payment gateway answered {}", http_status)
    } else {
      envelope.message
    }));
  }
  envelope
    .data
    .ok_or_else(|| GatewayError::Malformed("response has no data".to_string()))
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
  #[instrument(name = "paystack::initialize", skip_all, fields(reference = %request.reference), err(Display))]
  async fn initialize(&self, request: &InitializeRequest) -> Result<InitializedPayment, GatewayError> {
    self.ensure_configured()?;
    let body = InitializeBody {
      email: &request.email,
      amount: to_minor_units(request.amount)?,
      currency: &request.currency,
      reference: &request.reference,
      callback_url: &request.callback_url,
      metadata: &request.metadata,
    };
    let response = self
      .client
      .post(format!("{}/transaction/initialize", self.base_url))
      .bearer_auth(&self.secret_key)
      .json(&body)
      .send()
      .await
      .map_err(transport_error)?;
    let data: InitializeData = read_envelope(response).await?;
    if data.reference != request.reference {
      warn!(sent = %request.reference, returned = %data.reference, "Gateway echoed a different reference.");
    }
    Ok(InitializedPayment {
      authorization_url: data.authorization_url,
      access_code: data.access_code,
      reference: data.reference,
    })
  }

  #[instrument(name = "paystack::verify", skip(self), err(Display))]
  async fn verify(&self, reference: &str) -> Result<GatewayTransaction, GatewayError> {
    self.ensure_configured()?;
    let response = self
      .client
      .get(format!("{}/transaction/verify/{}", self.base_url, reference))
      .bearer_auth(&self.secret_key)
      .send()
      .await
      .map_err(transport_error)?;
    let data: Value = read_envelope(response).await?;
    parse_transaction(data)
  }

  fn validate_signature(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
    signature::verify(self.secret_key.as_bytes(), raw_body, signature)
  }

  fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
    parse_webhook_body(raw_body)
  }

  fn public_key(&self) -> Option<String> {
    Some(self.public_key.clone()).filter(|k| !k.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal::Decimal;
  use serde_json::json;

  #[test]
  fn transaction_data_maps_amount_status_and_card() {
    let tx = parse_transaction(json!({
      "id": 4099260516u64,
      "status": "success",
      "reference": "ORD-20250601-ABCDEF12_1a2b3c4d",
      "amount": 100000,
      "currency": "NGN",
      "channel": "card",
      "gateway_response": "Approved",
      "ip_address": "10.0.0.1",
      "paid_at": "2025-06-01T10:15:30.000Z",
      "created_at": "2025-06-01T10:14:00.000Z",
      "customer": { "email": "ada@example.com", "customer_code": "CUS_x" },
      "authorization": { "authorization_code": "AUTH_y", "last4": "4081", "card_type": "visa", "bank": "TEST BANK" }
    }))
    .unwrap();

    assert_eq!(tx.gateway_id.as_deref(), Some("4099260516"));
    assert_eq!(tx.status, TransactionStatus::Success);
    assert_eq!(tx.amount, Decimal::from(1000));
    assert_eq!(tx.authorization.last4.as_deref(), Some("4081"));
    assert!(tx.paid_at.is_some());
    assert!(tx.transaction_date.is_some());
  }

  #[test]
  fn webhook_events_are_classified() {
    let body = json!({ "event": "charge.failed", "data": { "reference": "r1", "status": "failed", "amount": 500 } });
    match parse_webhook_body(body.to_string().as_bytes()).unwrap() {
      WebhookEvent::ChargeFailed(tx) => assert_eq!(tx.status, TransactionStatus::Failed),
      other => panic!("unexpected event {:?}", other),
    }

    let body = json!({ "event": "transfer.success", "data": {} });
    assert!(matches!(
      parse_webhook_body(body.to_string().as_bytes()).unwrap(),
      WebhookEvent::Other(name) if name == "transfer.success"
    ));

    assert!(parse_webhook_body(b"not json").is_err());
    assert!(parse_webhook_body(br#"{"event":"charge.success"}"#).is_err());
  }

  #[test]
  fn naive_timestamps_are_utc() {
    let ts = parse_timestamp(Some("2025-06-01 10:15:30")).unwrap();
    assert_eq!(ts.to_rfc3339(), "2025-06-01T10:15:30+00:00");
    assert!(parse_timestamp(Some("yesterday")).is_none());
    assert!(parse_timestamp(None).is_none());
  }
}
