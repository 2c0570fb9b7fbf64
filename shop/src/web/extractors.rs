// shop/src/web/extractors.rs

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// The caller's user id from `X-User-ID`, or `None` for guest checkout.
///
/// Authentication itself happens upstream; a present but malformed header is rejected.
#[derive(Debug, Clone, Copy)]
pub struct OptionalUser(pub Option<Uuid>);

impl FromRequest for OptionalUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let Some(raw) = req.headers().get(USER_ID_HEADER) else {
      return ready(Ok(OptionalUser(None)));
    };
    let parsed = raw.to_str().ok().and_then(|s| Uuid::parse_str(s.trim()).ok());
    match parsed {
      Some(user_id) => ready(Ok(OptionalUser(Some(user_id)))),
      None => {
        warn!("OptionalUser extractor: malformed X-User-ID header.");
        ready(Err(AppError::Unauthorized("Malformed X-User-ID header".to_string())))
      }
    }
  }
}
