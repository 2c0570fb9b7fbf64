// shop/src/services/inventory.rs

//! Inventory ledger.
//!
//! Stock moves only through `adjust_stock` inside a unit of work, so every change is a
//! single atomic adjustment floored at zero. Order-level operations are guarded by the
//! order's `stock_committed` flag: committing twice, or releasing stock that was never
//! committed, is a no-op.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::InventoryMirrorConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::models::OrderLine;
use crate::store::{Store, UnitOfWork};

/// Secondary copy of stock levels, kept in sync best-effort. The local store stays
/// the source of truth.
#[async_trait]
pub trait InventoryMirror: Send + Sync {
  async fn push_levels(&self, levels: &[(Uuid, i32)]) -> anyhow::Result<()>;
}

/// Mirror backed by a PostgREST-style `products` table.
pub struct HttpInventoryMirror {
  client: Client,
  url: String,
  api_key: String,
}

impl HttpInventoryMirror {
  pub fn new(config: &InventoryMirrorConfig, timeout: Duration) -> AppResult<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("Inventory mirror HTTP client: {}", e)))?;
    Ok(Self {
      client,
      url: config.url.trim_end_matches('/').to_string(),
      api_key: config.api_key.clone(),
    })
  }
}

#[async_trait]
impl InventoryMirror for HttpInventoryMirror {
  async fn push_levels(&self, levels: &[(Uuid, i32)]) -> anyhow::Result<()> {
    for (product_id, stock) in levels {
      let response = self
        .client
        .patch(format!("{}/rest/v1/products", self.url))
        .query(&[("id", format!("eq.{}", product_id))])
        .header("apikey", &self.api_key)
        .bearer_auth(&self.api_key)
        .json(&json!({ "stock": stock, "updated_at": Utc::now() }))
        .send()
        .await?;
      if !response.status().is_success() {
        anyhow::bail!("mirror answered {} for product {}", response.status(), product_id);
      }
    }
    Ok(())
  }
}

#[derive(Clone, Default)]
pub struct InventoryLedger {
  mirror: Option<Arc<dyn InventoryMirror>>,
}

impl InventoryLedger {
  pub fn new(mirror: Option<Arc<dyn InventoryMirror>>) -> Self {
    Self { mirror }
  }

  /// Decrements stock by `quantity`, never below zero. A missing product is logged and
  /// skipped. Returns the new level when the product exists.
  pub async fn commit(&self, uow: &mut dyn UnitOfWork, product_id: Uuid, quantity: i32) -> AppResult<Option<i32>> {
    if quantity <= 0 {
      return Err(AppError::Validation(format!("Stock quantity must be positive, got {}", quantity)));
    }
    let level = uow.adjust_stock(product_id, -quantity).await?;
    match level {
      Some(stock) => debug!(%product_id, quantity, stock, "Stock committed."),
      None => warn!(%product_id, quantity, "Stock commit for unknown product skipped."),
    }
    Ok(level)
  }

  pub async fn release(&self, uow: &mut dyn UnitOfWork, product_id: Uuid, quantity: i32) -> AppResult<Option<i32>> {
    if quantity <= 0 {
      return Err(AppError::Validation(format!("Stock quantity must be positive, got {}", quantity)));
    }
    let level = uow.adjust_stock(product_id, quantity).await?;
    match level {
      Some(stock) => debug!(%product_id, quantity, stock, "Stock released."),
      None => warn!(%product_id, quantity, "Stock release for unknown product skipped."),
    }
    Ok(level)
  }

  /// Commits every line of the order unless the order's stock is already committed.
  /// Returns whether stock moved.
  pub async fn commit_order(&self, uow: &mut dyn UnitOfWork, order_id: Uuid, lines: &[OrderLine]) -> AppResult<bool> {
    if !uow.flip_stock_committed(order_id, false).await? {
      debug!(%order_id, "Order stock already committed.");
      return Ok(false);
    }
    for line in lines {
      match line.product_id {
        Some(product_id) => {
          self.commit(uow, product_id, line.quantity).await?;
        }
        None => warn!(%order_id, line_id = %line.id, "Order line has no product; nothing to commit."),
      }
    }
    Ok(true)
  }

  /// Puts back every line of the order if its stock was committed. Returns whether stock moved.
  pub async fn release_order(&self, uow: &mut dyn UnitOfWork, order_id: Uuid, lines: &[OrderLine]) -> AppResult<bool> {
    if !uow.flip_stock_committed(order_id, true).await? {
      debug!(%order_id, "Order stock not committed; nothing to release.");
      return Ok(false);
    }
    for line in lines {
      if let Some(product_id) = line.product_id {
        self.release(uow, product_id, line.quantity).await?;
      }
    }
    Ok(true)
  }

  /// `commit_order` in a unit of work of its own.
  #[instrument(name = "InventoryLedger::commit_order_now", skip(self, store), err(Display))]
  pub async fn commit_order_now(&self, store: &dyn Store, order_id: Uuid) -> AppResult<bool> {
    let lines = store.order_lines(order_id).await?;
    let mut uow = store.begin().await?;
    let moved = self.commit_order(uow.as_mut(), order_id, &lines).await?;
    uow.commit().await?;
    if moved {
      info!(%order_id, lines = lines.len(), "Order stock committed.");
    }
    Ok(moved)
  }

  /// `release_order` in a unit of work of its own.
  #[instrument(name = "InventoryLedger::release_order_now", skip(self, store), err(Display))]
  pub async fn release_order_now(&self, store: &dyn Store, order_id: Uuid) -> AppResult<bool> {
    let lines = store.order_lines(order_id).await?;
    let mut uow = store.begin().await?;
    let moved = self.release_order(uow.as_mut(), order_id, &lines).await?;
    uow.commit().await?;
    if moved {
      info!(%order_id, lines = lines.len(), "Order stock released.");
    }
    Ok(moved)
  }

  /// Pushes the current local levels of `product_ids` to the mirror, if one is
  /// configured. Failures are logged and never returned.
  pub async fn mirror_levels(&self, store: &dyn Store, product_ids: &[Uuid]) {
    let Some(mirror) = self.mirror.as_ref() else {
      return;
    };
    if product_ids.is_empty() {
      return;
    }
    let levels: Vec<(Uuid, i32)> = match store.find_products(product_ids).await {
      Ok(products) => products.into_iter().map(|p| (p.id, p.stock)).collect(),
      Err(e) => {
        warn!(error = %e, "Could not read stock levels for the inventory mirror.");
        return;
      }
    };
    match mirror.push_levels(&levels).await {
      Ok(()) => debug!(products = levels.len(), "Inventory mirror updated."),
      Err(e) => warn!(error = %e, "Inventory mirror update failed; local stock is authoritative."),
    }
  }
}
