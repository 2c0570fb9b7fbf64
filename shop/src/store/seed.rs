// shop/src/store/seed.rs

use rust_decimal::Decimal;
use tracing::info;

use super::{Store, StoreResult};
use crate::models::Product;

/// Catalogue used for local development (`SEED_DB=true`).
const DEMO_PRODUCTS: &[(&str, &str, i64, i32)] = &[
  ("Classic White Tee", "TEE-WHT-001", 1_500_000, 40),
  ("Denim Jacket", "JKT-DNM-002", 4_500_000, 15),
  ("Leather Sneakers", "SNK-LTH-003", 3_200_000, 25),
  ("Canvas Tote", "BAG-CNV-004", 800_000, 60),
];

/// Inserts the demo catalogue, skipping products whose SKU already exists.
/// Returns how many were inserted.
pub async fn seed_demo_products(store: &dyn Store) -> StoreResult<usize> {
  let mut inserted = 0;
  for (name, sku, price_kobo, stock) in DEMO_PRODUCTS {
    let mut product = Product::new(*name, Decimal::new(*price_kobo, 2), *stock);
    product.sku = Some(sku.to_string());
    if store.insert_product(&product).await? {
      inserted += 1;
    }
  }
  info!(inserted, "Demo catalogue seeded.");
  Ok(inserted)
}
