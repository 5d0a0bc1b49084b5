mod common;

use common::TestApp;
use orderflow_api::{
    entities::{promo_code, PromoCode},
    services::{AddCartItemsInput, CartItemInput},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

/// Checks out a $20 order and returns (order_id, customer_id).
async fn checked_out_order(app: &TestApp) -> (Uuid, Uuid) {
    let branch_id = app.seed_branch(false).await;
    let item = app.seed_item(dec!(20)).await;
    let customer_id = Uuid::new_v4();

    let cart = app
        .state
        .services
        .cart
        .find_or_create_cart(customer_id, branch_id)
        .await
        .unwrap();
    app.state
        .services
        .cart
        .add_or_replace_items(
            cart.id,
            AddCartItemsInput {
                items: vec![CartItemInput {
                    item_id: item,
                    quantity: 1,
                }],
            },
        )
        .await
        .unwrap();
    let order = app
        .state
        .services
        .checkout
        .create_order(cart.id, customer_id)
        .await
        .unwrap();
    (order.id, customer_id)
}

async fn usage_count(app: &TestApp, promo_id: Uuid) -> i32 {
    PromoCode::find_by_id(promo_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .usage_count
}

#[tokio::test]
async fn apply_discounts_order_and_counts_usage() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;
    let promo_id = app.seed_promo("WELCOME5", dec!(5), Some(100)).await;

    let order = app
        .state
        .services
        .promos
        .apply(order_id, "WELCOME5", customer_id)
        .await
        .expect("Promo apply failed");

    assert_eq!(order.total_discount, dec!(5));
    assert_eq!(order.total_amount, dec!(15));
    assert_eq!(order.promo_code_id, Some(promo_id));
    assert_eq!(usage_count(&app, promo_id).await, 1);
}

#[tokio::test]
async fn second_promo_on_same_order_rejected() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;
    app.seed_promo("FIRST", dec!(5), None).await;
    app.seed_promo("SECOND", dec!(3), None).await;

    app.state
        .services
        .promos
        .apply(order_id, "FIRST", customer_id)
        .await
        .unwrap();
    let err = app
        .state
        .services
        .promos
        .apply(order_id, "SECOND", customer_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROMO_ALREADY_APPLIED");
}

#[tokio::test]
async fn unknown_code_rejected() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;

    let err = app
        .state
        .services
        .promos
        .apply(order_id, "NOPE", customer_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROMO_CODE_NOT_ACTIVE");
}

#[tokio::test]
async fn out_of_window_code_rejected() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;
    let promo_id = app.seed_promo("LATE", dec!(5), None).await;

    // Push the window into the past.
    let row = PromoCode::find_by_id(promo_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: promo_code::ActiveModel = row.into();
    active.ends_at = Set(chrono::Utc::now() - chrono::Duration::hours(1));
    active.update(&*app.state.db).await.unwrap();

    let err = app
        .state
        .services
        .promos
        .apply(order_id, "LATE", customer_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROMO_CODE_EXPIRED");
}

#[tokio::test]
async fn exhausted_code_rejected() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;
    let promo_id = app.seed_promo("CAPPED", dec!(5), Some(1)).await;

    let row = PromoCode::find_by_id(promo_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: promo_code::ActiveModel = row.into();
    active.usage_count = Set(1);
    active.update(&*app.state.db).await.unwrap();

    let err = app
        .state
        .services
        .promos
        .apply(order_id, "CAPPED", customer_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROMO_CODE_NOT_ACTIVE");
    // The counter never exceeds its cap.
    assert_eq!(usage_count(&app, promo_id).await, 1);
}

#[tokio::test]
async fn one_time_per_customer_across_orders() {
    let app = TestApp::new().await;
    let (first_order, customer_id) = checked_out_order(&app).await;
    app.seed_promo("ONCE", dec!(5), None).await;

    app.state
        .services
        .promos
        .apply(first_order, "ONCE", customer_id)
        .await
        .unwrap();

    // Same customer, new order at another branch.
    let branch_id = app.seed_branch(false).await;
    let item = app.seed_item(dec!(20)).await;
    let cart = app
        .state
        .services
        .cart
        .find_or_create_cart(customer_id, branch_id)
        .await
        .unwrap();
    app.state
        .services
        .cart
        .add_or_replace_items(
            cart.id,
            AddCartItemsInput {
                items: vec![CartItemInput {
                    item_id: item,
                    quantity: 1,
                }],
            },
        )
        .await
        .unwrap();
    let second_order = app
        .state
        .services
        .checkout
        .create_order(cart.id, customer_id)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .promos
        .apply(second_order.id, "ONCE", customer_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROMO_CODE_ALREADY_USED");
}

#[tokio::test]
async fn remove_is_exact_inverse_of_apply() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;
    let promo_id = app.seed_promo("UNDO", dec!(5), Some(10)).await;

    app.state
        .services
        .promos
        .apply(order_id, "UNDO", customer_id)
        .await
        .unwrap();
    let order = app
        .state
        .services
        .promos
        .remove(order_id, "UNDO", customer_id)
        .await
        .unwrap();

    assert_eq!(order.total_discount, Decimal::ZERO);
    assert_eq!(order.total_amount, dec!(20));
    assert_eq!(order.promo_code_id, None);
    assert_eq!(usage_count(&app, promo_id).await, 0);

    // The code is usable again afterwards.
    app.state
        .services
        .promos
        .apply(order_id, "UNDO", customer_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn remove_without_applied_promo_rejected() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;
    app.seed_promo("GHOST", dec!(5), None).await;

    let err = app
        .state
        .services
        .promos
        .remove(order_id, "GHOST", customer_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROMO_NOT_APPLIED");
}

#[tokio::test]
async fn remove_with_wrong_code_rejected() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;
    app.seed_promo("RIGHT", dec!(5), None).await;
    app.seed_promo("WRONG", dec!(3), None).await;

    app.state
        .services
        .promos
        .apply(order_id, "RIGHT", customer_id)
        .await
        .unwrap();
    let err = app
        .state
        .services
        .promos
        .remove(order_id, "WRONG", customer_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PROMO_CODE_MISMATCH");
}

#[tokio::test]
async fn promo_cache_listing_invalidated_on_apply() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app).await;
    app.seed_promo("CACHED", dec!(5), None).await;

    use orderflow_api::cache::{CacheBackend, PROMO_LISTING_KEY};
    app.state
        .cache
        .set(PROMO_LISTING_KEY, "[\"CACHED\"]", None)
        .await
        .unwrap();

    app.state
        .services
        .promos
        .apply(order_id, "CACHED", customer_id)
        .await
        .unwrap();

    assert!(app
        .state
        .cache
        .get(PROMO_LISTING_KEY)
        .await
        .unwrap()
        .is_none());
}
