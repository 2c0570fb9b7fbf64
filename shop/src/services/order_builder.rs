// shop/src/services/order_builder.rs

//! Order aggregate builder.
//!
//! Turns a checkout request into a persisted pending order. Everything is checked
//! (shape, products, stock) before the single write, and the total always comes from
//! the catalogue prices. Client-side prices and totals are kept in `order_data` for
//! auditing only.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::types::Json;
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Order, OrderDetails, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, Product, ShippingAddress};
use crate::state::AppState;
use crate::store::Store;

pub const MAX_LINE_QUANTITY: i32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineRequest {
  pub product_id: Uuid,
  pub quantity: i32,
  /// Display values from the client; never used for pricing.
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub price: Option<Decimal>,
  #[serde(default)]
  pub size: Option<String>,
  #[serde(default)]
  pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressInput {
  #[serde(default)]
  pub street: Option<String>,
  #[serde(default)]
  pub city: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
  #[serde(default)]
  pub country: Option<String>,
  #[serde(default, alias = "zip_code", alias = "zipCode", alias = "postalCode")]
  pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
  #[serde(alias = "cart_items", alias = "cartItems", default)]
  pub items: Vec<CartLineRequest>,
  #[serde(default)]
  pub shipping_address: AddressInput,
  #[serde(default)]
  pub billing_address: Option<Value>,
  #[serde(alias = "customer_email", default)]
  pub email: String,
  #[serde(default)]
  pub customer_name: String,
  #[serde(default)]
  pub customer_phone: String,
  /// Client-declared total. Compared against the computed total, never stored as it.
  #[serde(default)]
  pub total_amount: Option<Decimal>,
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(default)]
  pub payment_method: PaymentMethod,
  #[serde(default)]
  pub notes: Option<String>,
}

/// Normalized pieces of a request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
  pub shipping_address: ShippingAddress,
  pub email: String,
  pub currency: String,
}

#[derive(Debug, Clone)]
pub struct PricedLine {
  pub product: Product,
  pub request: CartLineRequest,
}

#[derive(Debug, Clone)]
pub struct PricedCart {
  pub lines: Vec<PricedLine>,
  pub total: Decimal,
  /// Client values that disagreed with the catalogue.
  pub discrepancies: Vec<Value>,
}

fn required(field: &str, value: Option<&str>) -> AppResult<String> {
  match value.map(str::trim).filter(|v| !v.is_empty()) {
    Some(v) => Ok(v.to_string()),
    None => Err(AppError::Validation(format!("{} is required", field))),
  }
}

/// Syntactic check only: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
  if email.chars().any(char::is_whitespace) {
    return false;
  }
  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && !domain.contains('@')
    && domain.contains('.')
    && domain.split('.').all(|label| !label.is_empty())
}

pub fn validate(request: &CreateOrderRequest, default_currency: &str) -> AppResult<ValidatedRequest> {
  if request.items.is_empty() {
    return Err(AppError::Validation("Cart is empty".to_string()));
  }
  for line in &request.items {
    if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
      return Err(AppError::Validation(format!(
        "Quantity for product {} must be between 1 and {}, got {}",
        line.product_id, MAX_LINE_QUANTITY, line.quantity
      )));
    }
  }

  let address = &request.shipping_address;
  let shipping_address = ShippingAddress {
    street: required("Shipping street", address.street.as_deref())?,
    city: required("Shipping city", address.city.as_deref())?,
    state: required("Shipping state", address.state.as_deref())?,
    country: address.country.as_deref().map(str::trim).filter(|c| !c.is_empty()).map(str::to_string),
    postal_code: address
      .postal_code
      .as_deref()
      .map(str::trim)
      .filter(|c| !c.is_empty())
      .map(str::to_string),
  };

  let email = request.email.trim().to_ascii_lowercase();
  if !is_valid_email(&email) {
    return Err(AppError::Validation(format!("Invalid email address '{}'", request.email)));
  }
  required("Customer name", Some(&request.customer_name))?;
  required("Customer phone", Some(&request.customer_phone))?;

  let currency = request
    .currency
    .as_deref()
    .map(str::trim)
    .filter(|c| !c.is_empty())
    .unwrap_or(default_currency)
    .to_ascii_uppercase();
  if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
    return Err(AppError::Validation(format!("Invalid currency code '{}'", currency)));
  }

  Ok(ValidatedRequest {
    shipping_address,
    email,
    currency,
  })
}

/// Resolves every line against the catalogue and checks stock for the whole cart.
/// Quantities of repeated products are summed before the stock check.
#[instrument(name = "order_builder::price_cart", skip_all, fields(lines = request.items.len()), err(Display))]
pub async fn price_cart(store: &dyn Store, request: &CreateOrderRequest) -> AppResult<PricedCart> {
  let mut ids: Vec<Uuid> = request.items.iter().map(|l| l.product_id).collect();
  ids.sort_unstable();
  ids.dedup();
  let catalogue: HashMap<Uuid, Product> = store
    .find_products(&ids)
    .await?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

  let mut requested: HashMap<Uuid, i32> = HashMap::new();
  let mut lines = Vec::with_capacity(request.items.len());
  let mut discrepancies = Vec::new();
  let mut total = Decimal::ZERO;

  for line in &request.items {
    let product = match catalogue.get(&line.product_id) {
      Some(p) if p.is_active => p,
      _ => return Err(AppError::NotFound(format!("Product {} not found", line.product_id))),
    };
    *requested.entry(product.id).or_insert(0) += line.quantity;
    total += product.price * Decimal::from(line.quantity);

    if let Some(client_price) = line.price {
      if client_price != product.price {
        warn!(
          product_id = %product.id,
          %client_price,
          catalogue_price = %product.price,
          "Client line price differs from catalogue; using catalogue price."
        );
        discrepancies.push(json!({
          "product_id": product.id,
          "client_price": client_price,
          "catalogue_price": product.price,
        }));
      }
    }
    lines.push(PricedLine {
      product: product.clone(),
      request: line.clone(),
    });
  }

  for (product_id, quantity) in &requested {
    if let Some(product) = catalogue.get(product_id) {
      if *quantity > product.stock {
        return Err(AppError::InsufficientStock {
          product_id: *product_id,
          product_name: product.name.clone(),
          requested: *quantity,
          available: product.stock,
        });
      }
    }
  }

  if let Some(declared) = request.total_amount {
    if declared != total {
      warn!(%declared, computed = %total, "Declared order total differs from computed total.");
      discrepancies.push(json!({ "declared_total": declared, "computed_total": total }));
    }
  }

  Ok(PricedCart {
    lines,
    total,
    discrepancies,
  })
}

fn assemble(
  order_number: String,
  user_id: Option<Uuid>,
  request: &CreateOrderRequest,
  validated: &ValidatedRequest,
  priced: &PricedCart,
) -> (Order, Vec<OrderLine>) {
  let now = Utc::now();
  let order_id = Uuid::new_v4();
  let order = Order {
    id: order_id,
    order_number,
    user_id,
    customer_name: request.customer_name.trim().to_string(),
    customer_email: validated.email.clone(),
    customer_phone: request.customer_phone.trim().to_string(),
    shipping_address: Json(validated.shipping_address.clone()),
    total_amount: priced.total,
    currency: validated.currency.clone(),
    status: OrderStatus::Pending,
    payment_status: PaymentStatus::Pending,
    payment_method: request.payment_method,
    payment_reference: None,
    authorization_url: None,
    access_code: None,
    gateway_transaction_id: None,
    stock_committed: false,
    order_data: json!({
      "cart_items": request.items,
      "billing_address": request.billing_address,
      "declared_total": request.total_amount,
      "price_discrepancies": priced.discrepancies,
    }),
    notes: request.notes.clone(),
    created_at: now,
    updated_at: now,
    paid_at: None,
  };
  let lines = priced
    .lines
    .iter()
    .map(|line| OrderLine {
      id: Uuid::new_v4(),
      order_id,
      product_id: Some(line.product.id),
      quantity: line.request.quantity,
      unit_price: line.product.price,
      product_name: line.product.name.clone(),
      product_sku: line.product.sku.clone(),
      product_image: line.product.image.clone(),
      size: line.request.size.clone(),
      color: line.request.color.clone(),
      created_at: now,
    })
    .collect();
  (order, lines)
}

/// Writes the order and its lines in one unit of work, minting a fresh order number
/// whenever the previous one collides.
#[instrument(name = "order_builder::persist", skip_all, fields(total = %priced.total), err(Display))]
pub async fn persist(
  app_state: &AppState,
  user_id: Option<Uuid>,
  request: &CreateOrderRequest,
  validated: &ValidatedRequest,
  priced: &PricedCart,
) -> AppResult<OrderDetails> {
  let attempts = app_state.config.max_number_attempts;
  for attempt in 1..=attempts {
    let order_number = app_state
      .minter
      .order_number(&app_state.config.order_number_prefix, Utc::now().date_naive());
    let (order, lines) = assemble(order_number, user_id, request, validated, priced);

    let mut uow = app_state.store.begin().await?;
    match uow.insert_order(&order, &lines).await {
      Ok(()) => {
        uow.commit().await?;
        info!(order_id = %order.id, order_number = %order.order_number, "Order created.");
        return Ok(OrderDetails { order, lines });
      }
      Err(e) if e.is_duplicate() => {
        uow.rollback().await?;
        warn!(attempt, order_number = %order.order_number, "Order number collision; minting another.");
      }
      Err(e) => {
        if let Err(rollback_err) = uow.rollback().await {
          warn!(error = %rollback_err, "Rollback after failed order insert also failed.");
        }
        return Err(e.into());
      }
    }
  }
  Err(AppError::Internal(format!(
    "Could not allocate a unique order number after {} attempts",
    attempts
  )))
}

/// Validate, price and persist in one go.
pub async fn build(app_state: &AppState, user_id: Option<Uuid>, request: &CreateOrderRequest) -> AppResult<OrderDetails> {
  let validated = validate(request, &app_state.config.default_currency)?;
  let priced = price_cart(app_state.store.as_ref(), request).await?;
  persist(app_state, user_id, request, &validated, &priced).await
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request() -> CreateOrderRequest {
    serde_json::from_value(json!({
      "cart_items": [{ "product_id": Uuid::new_v4(), "quantity": 2, "price": 500 }],
      "shipping_address": { "street": "1 Marina", "city": "Lagos", "state": "Lagos" },
      "email": "Ada@Example.com",
      "customer_name": "Ada",
      "customer_phone": "+2348000000000",
      "payment_method": "paystack"
    }))
    .unwrap()
  }

  #[test]
  fn valid_request_is_normalized() {
    let validated = validate(&request(), "ngn").unwrap();
    assert_eq!(validated.email, "ada@example.com");
    assert_eq!(validated.currency, "NGN");
    assert_eq!(validated.shipping_address.city, "Lagos");
    assert_eq!(request().payment_method, PaymentMethod::Gateway);
  }

  #[test]
  fn shape_errors_are_validation_errors() {
    let mut empty = request();
    empty.items.clear();
    assert!(matches!(validate(&empty, "NGN"), Err(AppError::Validation(_))));

    let mut too_many = request();
    too_many.items[0].quantity = MAX_LINE_QUANTITY + 1;
    assert!(matches!(validate(&too_many, "NGN"), Err(AppError::Validation(_))));

    let mut zero = request();
    zero.items[0].quantity = 0;
    assert!(matches!(validate(&zero, "NGN"), Err(AppError::Validation(_))));

    let mut no_city = request();
    no_city.shipping_address.city = Some("  ".to_string());
    assert!(matches!(validate(&no_city, "NGN"), Err(AppError::Validation(_))));

    let mut no_phone = request();
    no_phone.customer_phone.clear();
    assert!(matches!(validate(&no_phone, "NGN"), Err(AppError::Validation(_))));
  }

  #[test]
  fn email_syntax() {
    assert!(is_valid_email("a@b.co"));
    assert!(!is_valid_email("a@b"));
    assert!(!is_valid_email("@b.co"));
    assert!(!is_valid_email("a b@c.io"));
    assert!(!is_valid_email("a@@b.io"));
    assert!(!is_valid_email("a@b..io"));
  }
}
