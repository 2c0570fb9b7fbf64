// shop/src/services/notifications.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{Order, OrderLine, OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationItem {
  pub name: String,
  pub quantity: i32,
  pub unit_price: Decimal,
  pub size: Option<String>,
  pub color: Option<String>,
}

/// Everything a confirmation email renders from.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
  pub to: String,
  pub customer_name: String,
  pub order_number: String,
  pub order_date: DateTime<Utc>,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub shipping_address: String,
  pub items: Vec<ConfirmationItem>,
  pub total_amount: Decimal,
  pub currency: String,
}

impl OrderConfirmation {
  pub fn from_order(order: &Order, lines: &[OrderLine]) -> Self {
    Self {
      to: order.customer_email.clone(),
      customer_name: order.customer_name.clone(),
      order_number: order.order_number.clone(),
      order_date: order.created_at,
      status: order.status,
      payment_status: order.payment_status,
      shipping_address: order.shipping_address.one_line(),
      items: lines
        .iter()
        .map(|line| ConfirmationItem {
          name: line.product_name.clone(),
          quantity: line.quantity,
          unit_price: line.unit_price,
          size: line.size.clone(),
          color: line.color.clone(),
        })
        .collect(),
      total_amount: order.total_amount,
      currency: order.currency.clone(),
    }
  }

  /// Same message addressed to someone else.
  pub fn with_recipient(mut self, to: impl Into<String>, customer_name: Option<String>) -> Self {
    self.to = to.into();
    if let Some(name) = customer_name.filter(|n| !n.trim().is_empty()) {
      self.customer_name = name;
    }
    self
  }

  pub fn subject(&self) -> String {
    format!("Order Confirmation - {}", self.order_number)
  }
}

/// Outbound mail transport. Template rendering and delivery live behind it.
#[async_trait]
pub trait Mailer: Send + Sync {
  /// Sends the confirmation and returns the transport's message id.
  async fn send_order_confirmation(&self, sender: &str, message: &OrderConfirmation) -> anyhow::Result<String>;
}

/// Default transport: writes the message to the log.
#[derive(Debug, Default)]
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
  async fn send_order_confirmation(&self, sender: &str, message: &OrderConfirmation) -> anyhow::Result<String> {
    let message_id = format!("log_email_{}", Uuid::new_v4());
    info!(
      to = %message.to,
      from = %sender,
      subject = %message.subject(),
      items = message.items.len(),
      total = %message.total_amount,
      %message_id,
      "Order confirmation email (logged, not delivered)."
    );
    Ok(message_id)
  }
}

/// Fire-and-forget confirmation sender. Nothing it does can fail the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
  mailer: Arc<dyn Mailer>,
  sender: String,
  timeout: Duration,
}

impl NotificationDispatcher {
  pub fn new(mailer: Arc<dyn Mailer>, sender: impl Into<String>, timeout: Duration) -> Self {
    Self {
      mailer,
      sender: sender.into(),
      timeout,
    }
  }

  /// Spawns the send and returns immediately. The handle is only for callers that
  /// want to wait, such as tests.
  pub fn order_confirmed(&self, message: OrderConfirmation) -> JoinHandle<()> {
    let mailer = Arc::clone(&self.mailer);
    let sender = self.sender.clone();
    let timeout = self.timeout;
    tokio::spawn(async move {
      let order_number = message.order_number.clone();
      match tokio::time::timeout(timeout, mailer.send_order_confirmation(&sender, &message)).await {
        Ok(Ok(message_id)) => info!(%order_number, %message_id, "Order confirmation sent."),
        Ok(Err(e)) => error!(%order_number, error = %e, "Order confirmation failed to send."),
        Err(_) => warn!(%order_number, timeout_secs = timeout.as_secs(), "Order confirmation timed out."),
      }
    })
  }
}
