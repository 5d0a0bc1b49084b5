mod common;

use common::TestApp;
use orderflow_api::{
    entities::{
        order::OrderStatus,
        payment::PaymentStatus,
        payment_transaction::{TransactionMethod, TransactionStatus},
    },
    services::{AddCartItemsInput, CartItemInput, PaymentOptionInput},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Checks out a single-item cart and returns (order_id, customer_id).
async fn order_awaiting_payment(app: &TestApp, price: Decimal) -> (Uuid, Uuid) {
    let branch_id = app.seed_branch(false).await;
    let item = app.seed_item(price).await;
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
    assert_eq!(order.status, OrderStatus::PendingPayment);
    (order.id, customer_id)
}

fn balance_option(amount: Decimal) -> PaymentOptionInput {
    PaymentOptionInput {
        method: TransactionMethod::Balance,
        amount,
    }
}

fn online_option(amount: Decimal) -> PaymentOptionInput {
    PaymentOptionInput {
        method: TransactionMethod::OnlinePayment,
        amount,
    }
}

#[tokio::test]
async fn balance_payment_settles_and_advances_order() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = order_awaiting_payment(&app, dec!(10)).await;
    app.seed_balance(customer_id, dec!(50)).await;

    let outcome = app
        .state
        .services
        .payments
        .create_payment(
            order_id,
            "pay-key-1".to_string(),
            vec![balance_option(dec!(10))],
            customer_id,
        )
        .await
        .expect("Payment failed");

    assert_eq!(outcome.payment.status, PaymentStatus::Succeeded);
    assert_eq!(outcome.transactions.len(), 1);
    assert_eq!(outcome.transactions[0].status, TransactionStatus::Completed);

    // Exact settlement drives the automatic transition.
    let order = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    assert_eq!(order.paid_amount, order.total_amount);
    assert_eq!(order.status, OrderStatus::PendingConfirmation);
    assert_eq!(app.balance_of(customer_id).await, dec!(40));
}

#[tokio::test]
async fn same_idempotency_key_replays_without_second_debit() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = order_awaiting_payment(&app, dec!(10)).await;
    app.seed_balance(customer_id, dec!(50)).await;

    let first = app
        .state
        .services
        .payments
        .create_payment(
            order_id,
            "retry-key".to_string(),
            vec![balance_option(dec!(10))],
            customer_id,
        )
        .await
        .unwrap();
    let second = app
        .state
        .services
        .payments
        .create_payment(
            order_id,
            "retry-key".to_string(),
            vec![balance_option(dec!(10))],
            customer_id,
        )
        .await
        .expect("Replay must succeed");

    assert_eq!(first.payment.id, second.payment.id);
    // No second monetary effect.
    assert_eq!(app.balance_of(customer_id).await, dec!(40));
    let order = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    assert_eq!(order.paid_amount, dec!(10));
}

#[tokio::test]
async fn amount_mismatch_rejected_before_any_row() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = order_awaiting_payment(&app, dec!(10)).await;
    app.seed_balance(customer_id, dec!(50)).await;

    let err = app
        .state
        .services
        .payments
        .create_payment(
            order_id,
            "short-key".to_string(),
            vec![balance_option(dec!(7))],
            customer_id,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_AMOUNT_MISMATCH");

    // Rejected pre-allocation: no payment row at all, not even a failed one.
    let payments = app
        .state
        .services
        .payments
        .list_payments(order_id)
        .await
        .unwrap();
    assert!(payments.is_empty());
    assert_eq!(app.balance_of(customer_id).await, dec!(50));
}

#[tokio::test]
async fn insufficient_balance_preserves_failed_payment() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = order_awaiting_payment(&app, dec!(10)).await;
    app.seed_balance(customer_id, dec!(3)).await;

    let err = app
        .state
        .services
        .payments
        .create_payment(
            order_id,
            "poor-key".to_string(),
            vec![balance_option(dec!(10))],
            customer_id,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_BALANCE");

    // No partial debit, but the attempt is auditable as a failed payment.
    assert_eq!(app.balance_of(customer_id).await, dec!(3));
    let payments = app
        .state
        .services
        .payments
        .list_payments(order_id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    assert!(payments[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("INSUFFICIENT_BALANCE"));

    // The order is untouched.
    let order = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    assert_eq!(order.paid_amount, Decimal::ZERO);
    assert_eq!(order.status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn split_payment_stays_pending_until_online_settles() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = order_awaiting_payment(&app, dec!(10)).await;
    app.seed_balance(customer_id, dec!(6)).await;

    let outcome = app
        .state
        .services
        .payments
        .create_payment(
            order_id,
            "split-key".to_string(),
            vec![balance_option(dec!(6)), online_option(dec!(4))],
            customer_id,
        )
        .await
        .unwrap();

    // Balance leg settled, online leg pending, payment pending overall.
    assert_eq!(outcome.payment.status, PaymentStatus::Pending);
    let online = outcome
        .transactions
        .iter()
        .find(|t| t.method == TransactionMethod::OnlinePayment)
        .unwrap();
    assert_eq!(online.status, TransactionStatus::Pending);
    assert_eq!(app.balance_of(customer_id).await, Decimal::ZERO);

    let order = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    assert_eq!(order.paid_amount, dec!(6));
    assert_eq!(order.status, OrderStatus::PendingPayment);

    // Gateway callback settles the online leg; payment succeeds and the
    // order advances.
    let settled = app
        .state
        .services
        .payments
        .settle_online_transaction(online.id, customer_id)
        .await
        .unwrap();
    assert_eq!(settled.payment.status, PaymentStatus::Succeeded);

    let order = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    assert_eq!(order.paid_amount, dec!(10));
    assert_eq!(order.status, OrderStatus::PendingConfirmation);

    // Settling again is a no-op.
    let again = app
        .state
        .services
        .payments
        .settle_online_transaction(online.id, customer_id)
        .await
        .unwrap();
    assert_eq!(again.payment.status, PaymentStatus::Succeeded);
    let order = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    assert_eq!(order.paid_amount, dec!(10));
}

#[tokio::test]
async fn duplicate_method_options_rejected() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = order_awaiting_payment(&app, dec!(10)).await;

    let err = app
        .state
        .services
        .payments
        .create_payment(
            order_id,
            "dup-key".to_string(),
            vec![balance_option(dec!(5)), balance_option(dec!(5))],
            customer_id,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PAYMENT_OPTION_DUPLICATE");
}

#[tokio::test]
async fn otp_branch_payment_advances_to_verification() {
    let app = TestApp::new().await;
    let branch_id = app.seed_branch(true).await;
    let item = app.seed_item(dec!(10)).await;
    let customer_id = Uuid::new_v4();
    app.seed_balance(customer_id, dec!(10)).await;

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

    app.state
        .services
        .payments
        .create_payment(
            order.id,
            "otp-branch-key".to_string(),
            vec![balance_option(dec!(10))],
            customer_id,
        )
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .get_order(order.id)
        .await
        .unwrap()
        .order;
    assert_eq!(order.status, OrderStatus::PendingVerification);
}
