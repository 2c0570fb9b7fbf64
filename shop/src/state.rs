// shop/src/state.rs

use shopflow::Registry;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines;
use crate::services::gateway::PaymentGateway;
use crate::services::inventory::{InventoryLedger, InventoryMirror};
use crate::services::notifications::{Mailer, NotificationDispatcher};
use crate::services::references::ReferenceMinter;
use crate::store::Store;

/// Everything a request handler or pipeline step needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>,
  pub store: Arc<dyn Store>,
  pub gateway: Arc<dyn PaymentGateway>,
  pub ledger: InventoryLedger,
  pub notifier: NotificationDispatcher,
  pub minter: ReferenceMinter,
  pub registry: Arc<Registry<AppError>>,
}

impl AppState {
  /// Wires the collaborators together and registers every pipeline.
  pub fn new(
    config: AppConfig,
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    mailer: Arc<dyn Mailer>,
    mirror: Option<Arc<dyn InventoryMirror>>,
  ) -> Self {
    let registry = Registry::<AppError>::new();
    pipelines::register_all_pipelines(&registry);

    let notifier = NotificationDispatcher::new(mailer, config.email_sender.clone(), config.notification_timeout);
    Self {
      config: Arc::new(config),
      store,
      gateway,
      ledger: InventoryLedger::new(mirror),
      notifier,
      minter: ReferenceMinter::random(),
      registry: Arc::new(registry),
    }
  }

  /// Replaces the order-number and reference minter.
  pub fn with_minter(mut self, minter: ReferenceMinter) -> Self {
    self.minter = minter;
    self
  }
}
