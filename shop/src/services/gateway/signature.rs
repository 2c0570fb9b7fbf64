// shop/src/services/gateway/signature.rs

//! Webhook signatures: hex-encoded HMAC-SHA512 of the raw request body, keyed with the
//! gateway secret key.

use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Header the gateway puts the signature in.
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Hex signature of `body`. Used by gateway fakes and test fixtures.
pub fn sign(secret: &[u8], body: &[u8]) -> String {
  let mut mac = match HmacSha512::new_from_slice(secret) {
    Ok(mac) => mac,
    Err(_) => return String::new(),
  };
  mac.update(body);
  hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of `header` against the body. An empty secret or a missing,
/// blank or non-hex header never verifies.
pub fn verify(secret: &[u8], body: &[u8], header: Option<&str>) -> bool {
  if secret.is_empty() {
    return false;
  }
  let Some(header) = header.map(str::trim).filter(|h| !h.is_empty()) else {
    return false;
  };
  let Ok(expected) = hex::decode(header) else {
    return false;
  };
  let Ok(mut mac) = HmacSha512::new_from_slice(secret) else {
    return false;
  };
  mac.update(body);
  mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  const SECRET: &[u8] = b"sk_test_secret";
  const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"ORD-1"}}"#;

  #[test]
  fn accepts_own_signature() {
    let sig = sign(SECRET, BODY);
    assert_eq!(sig.len(), 128);
    assert!(verify(SECRET, BODY, Some(&sig)));
    assert!(verify(SECRET, BODY, Some(&sig.to_uppercase())));
  }

  #[test]
  fn rejects_tampering_and_missing_headers() {
    let sig = sign(SECRET, BODY);
    assert!(!verify(SECRET, b"{}", Some(&sig)));
    assert!(!verify(b"other", BODY, Some(&sig)));
    assert!(!verify(SECRET, BODY, None));
    assert!(!verify(SECRET, BODY, Some("   ")));
    assert!(!verify(SECRET, BODY, Some("not-hex")));
    assert!(!verify(b"", BODY, Some(&sign(b"", BODY))));
  }
}
