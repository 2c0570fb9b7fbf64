// shop/tests/order_builder_tests.rs
mod common;

use common::*;
use rust_decimal::Decimal;
use serial_test::serial;

use storefront::errors::AppError;
use storefront::models::{OrderStatus, PaymentMethod, PaymentStatus};
use storefront::pipelines::contexts::CheckoutCtxData;
use storefront::pipelines::run_checkout;
use storefront::services::order_builder;
use storefront::store::Store;

#[tokio::test]
#[serial]
async fn total_is_sum_of_catalogue_prices() {
  let app = test_app();
  let tee = add_product(&app.store, "Tee", 500, 10).await;
  let jacket = add_product(&app.store, "Jacket", 4250, 3).await;

  let request = order_request_lines(&[(tee.id, 2), (jacket.id, 3), (tee.id, 1)], PaymentMethod::Gateway);
  let details = order_builder::build(&app.state, None, &request).await.unwrap();

  assert_eq!(details.order.total_amount, Decimal::from(500 * 3 + 4250 * 3));
  let line_sum: Decimal = details.lines.iter().map(|l| l.line_total()).sum();
  assert_eq!(details.order.total_amount, line_sum);
  assert_eq!(details.order.status, OrderStatus::Pending);
  assert_eq!(details.order.payment_status, PaymentStatus::Pending);
  assert!(details.order.payment_reference.is_none());
  assert_eq!(details.lines.len(), 3);

  // Creation alone never touches stock.
  assert_eq!(app.store.stock_of(tee.id).await, Some(10));
  assert_eq!(app.store.stock_of(jacket.id).await, Some(3));
}

#[tokio::test]
#[serial]
async fn insufficient_stock_persists_nothing() {
  let app = test_app();
  let tee = add_product(&app.store, "Tee", 500, 10).await;
  let jacket = add_product(&app.store, "Jacket", 4250, 1).await;

  let request = order_request_lines(&[(tee.id, 2), (jacket.id, 2)], PaymentMethod::Gateway);
  match order_builder::build(&app.state, None, &request).await {
    Err(AppError::InsufficientStock {
      product_id,
      requested,
      available,
      ..
    }) => {
      assert_eq!(product_id, jacket.id);
      assert_eq!(requested, 2);
      assert_eq!(available, 1);
    }
    other => panic!("expected InsufficientStock, got {:?}", other.map(|d| d.order.order_number)),
  }

  assert_eq!(app.store.order_count().await, 0);
  assert_eq!(app.store.line_count().await, 0);
}

#[tokio::test]
#[serial]
async fn repeated_lines_are_summed_for_the_stock_check() {
  let app = test_app();
  let tee = add_product(&app.store, "Tee", 500, 3).await;

  let request = order_request_lines(&[(tee.id, 2), (tee.id, 2)], PaymentMethod::Gateway);
  let err = order_builder::build(&app.state, None, &request).await.unwrap_err();
  assert!(matches!(err, AppError::InsufficientStock { requested: 4, available: 3, .. }));
  assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
#[serial]
async fn unknown_or_inactive_products_are_not_found() {
  let app = test_app();
  let request = order_request(uuid::Uuid::new_v4(), 1, PaymentMethod::Gateway);
  assert!(matches!(
    order_builder::build(&app.state, None, &request).await,
    Err(AppError::NotFound(_))
  ));

  let mut retired = storefront::models::Product::new("Retired", Decimal::from(100), 5);
  retired.is_active = false;
  app.store.insert_product(&retired).await.unwrap();
  let request = order_request(retired.id, 1, PaymentMethod::Gateway);
  assert!(matches!(
    order_builder::build(&app.state, None, &request).await,
    Err(AppError::NotFound(_))
  ));
  assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
#[serial]
async fn client_prices_and_totals_are_never_trusted() {
  let app = test_app();
  let tee = add_product(&app.store, "Tee", 500, 10).await;

  let mut request = order_request(tee.id, 2, PaymentMethod::Gateway);
  request.items[0].price = Some(Decimal::from(1));
  request.total_amount = Some(Decimal::from(2));

  let details = order_builder::build(&app.state, None, &request).await.unwrap();
  assert_eq!(details.order.total_amount, Decimal::from(1000));
  assert_eq!(details.lines[0].unit_price, Decimal::from(500));

  let recorded = details.order.order_data["price_discrepancies"].as_array().unwrap();
  assert_eq!(recorded.len(), 2);
}

#[tokio::test]
#[serial]
async fn order_number_collisions_are_retried() {
  let app = test_app_with(
    test_config(&[]),
    Some(scripted_minter(&["aaaaaaaa", "aaaaaaaa", "bbbbbbbb"])),
  );
  let tee = add_product(&app.store, "Tee", 500, 10).await;
  let request = order_request(tee.id, 1, PaymentMethod::Gateway);

  let first = order_builder::build(&app.state, None, &request).await.unwrap();
  let second = order_builder::build(&app.state, None, &request).await.unwrap();

  assert!(first.order.order_number.ends_with("-AAAAAAAA"));
  assert!(first.order.order_number.starts_with("ORD-"));
  assert!(second.order.order_number.ends_with("-BBBBBBBB"));
  assert_eq!(app.store.order_count().await, 2);
}

#[tokio::test]
#[serial]
async fn exhausted_collision_retries_fail_internal() {
  let app = test_app_with(
    test_config(&[("ORDER_NUMBER_MAX_ATTEMPTS", "2")]),
    Some(scripted_minter(&["cccccccc", "cccccccc", "cccccccc"])),
  );
  let tee = add_product(&app.store, "Tee", 500, 10).await;
  let request = order_request(tee.id, 1, PaymentMethod::Gateway);

  order_builder::build(&app.state, None, &request).await.unwrap();
  let err = order_builder::build(&app.state, None, &request).await.unwrap_err();
  assert!(matches!(err, AppError::Internal(_)));
  assert_eq!(app.store.order_count().await, 1);
}

#[tokio::test]
#[serial]
async fn checkout_pipeline_creates_order_for_registered_user() {
  let app = test_app();
  let tee = add_product(&app.store, "Tee", 500, 10).await;
  let user_id = uuid::Uuid::new_v4();

  let data = CheckoutCtxData::for_new_order(
    app.state.clone(),
    Some(user_id),
    order_request(tee.id, 2, PaymentMethod::Gateway),
    false,
  );
  let result = run_checkout(&app.state.registry, data).await.unwrap();

  let details = result.order.expect("order created");
  assert_eq!(details.order.user_id, Some(user_id));
  assert_eq!(details.order.total_amount, Decimal::from(1000));
  assert!(result.initiation.is_none());
  assert_eq!(app.gateway.initialize_count(), 0);
}

#[tokio::test]
#[serial]
async fn validation_failures_stop_before_any_write() {
  let app = test_app();
  let tee = add_product(&app.store, "Tee", 500, 10).await;
  let mut request = order_request(tee.id, 1, PaymentMethod::Gateway);
  request.email = "not-an-email".to_string();

  let data = CheckoutCtxData::for_new_order(app.state.clone(), None, request, true);
  let err = run_checkout(&app.state.registry, data).await.unwrap_err();
  assert!(matches!(err, AppError::Validation(_)));
  assert_eq!(app.store.order_count().await, 0);
  assert_eq!(app.gateway.initialize_count(), 0);
}
