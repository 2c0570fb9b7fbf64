// shop/src/services/references.rs

use chrono::NaiveDate;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Produces the 8-hex-digit suffixes used in order numbers and payment references.
pub type SuffixSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Mints order numbers (`{prefix}-{YYYYMMDD}-{SUFFIX}`) and payment references
/// (`{order_number}_{suffix}`). Uniqueness is enforced by the store; callers retry
/// with a fresh suffix on collision.
#[derive(Clone)]
pub struct ReferenceMinter {
  suffixes: SuffixSource,
}

impl ReferenceMinter {
  pub fn random() -> Self {
    Self::from_source(Arc::new(random_suffix))
  }

  pub fn from_source(suffixes: SuffixSource) -> Self {
    Self { suffixes }
  }

  pub fn order_number(&self, prefix: &str, date: NaiveDate) -> String {
    format!(
      "{}-{}-{}",
      prefix,
      date.format("%Y%m%d"),
      (self.suffixes)().to_ascii_uppercase()
    )
  }

  pub fn payment_reference(&self, order_number: &str) -> String {
    format!("{}_{}", order_number, (self.suffixes)().to_ascii_lowercase())
  }
}

impl Default for ReferenceMinter {
  fn default() -> Self {
    Self::random()
  }
}

impl fmt::Debug for ReferenceMinter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ReferenceMinter").finish_non_exhaustive()
  }
}

fn random_suffix() -> String {
  let mut hex = Uuid::new_v4().simple().to_string();
  hex.truncate(8);
  hex
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formats_numbers_and_references() {
    let minter = ReferenceMinter::from_source(Arc::new(|| "a1b2c3d4".to_string()));
    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let number = minter.order_number("ORD", date);
    assert_eq!(number, "ORD-20250601-A1B2C3D4");
    assert_eq!(minter.payment_reference(&number), "ORD-20250601-A1B2C3D4_a1b2c3d4");
  }

  #[test]
  fn random_suffixes_are_eight_hex_digits() {
    let minter = ReferenceMinter::random();
    let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
    let number = minter.order_number("ORD", date);
    let suffix = number.rsplit('-').next().unwrap();
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
  }
}
