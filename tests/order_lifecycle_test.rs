mod common;

use common::TestApp;
use orderflow_api::{
    entities::order::OrderStatus,
    services::{AddCartItemsInput, CartItemInput, OrderAction},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Checks out a cart and returns (order_id, customer_id). Set
/// `approval_required` / `otp_branch` to steer the initial status.
async fn checked_out_order(
    app: &TestApp,
    approval_required: bool,
    otp_branch: bool,
) -> (Uuid, Uuid) {
    let branch_id = app.seed_branch(otp_branch).await;
    let item = app
        .seed_item_with(dec!(10), true, false, approval_required)
        .await;
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

/// Drives an order into `pending_confirmation`/`pending_verification` by
/// paying it in full from balance.
async fn pay_in_full(app: &TestApp, order_id: Uuid, customer_id: Uuid) {
    app.seed_balance(customer_id, dec!(100)).await;
    let order = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    app.state
        .services
        .payments
        .create_payment(
            order_id,
            format!("full-{}", order_id),
            vec![orderflow_api::services::PaymentOptionInput {
                method: orderflow_api::entities::payment_transaction::TransactionMethod::Balance,
                amount: order.remaining_amount(),
            }],
            customer_id,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn approve_moves_to_pending_payment() {
    let app = TestApp::new().await;
    let (order_id, _) = checked_out_order(&app, true, false).await;

    let order = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Approve, Uuid::new_v4(), None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn reject_requires_reason() {
    let app = TestApp::new().await;
    let (order_id, _) = checked_out_order(&app, true, false).await;

    let err = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Reject, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let order = app
        .state
        .services
        .orders
        .transition(
            order_id,
            OrderAction::Reject,
            Uuid::new_v4(),
            Some("Out of stock".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Rejected);
    assert!(order.finalized_at.is_some());
}

#[tokio::test]
async fn cancel_only_from_allowed_states() {
    let app = TestApp::new().await;

    // Cancelable while awaiting payment.
    let (order_id, _) = checked_out_order(&app, false, false).await;
    let order = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Cancel, Uuid::new_v4(), None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Canceled);

    // Not cancelable once confirmed.
    let (order_id, customer_id) = checked_out_order(&app, false, false).await;
    pay_in_full(&app, order_id, customer_id).await;
    app.state
        .services
        .orders
        .transition(order_id, OrderAction::Confirm, customer_id, None)
        .await
        .unwrap();
    let err = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Cancel, customer_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ORDER_STATUS_CONFLICT");
}

#[tokio::test]
async fn reopen_canceled_returns_to_pending_payment() {
    let app = TestApp::new().await;
    let (order_id, _) = checked_out_order(&app, false, false).await;

    let actor = Uuid::new_v4();
    app.state
        .services
        .orders
        .transition(order_id, OrderAction::Cancel, actor, None)
        .await
        .unwrap();
    let canceled = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    let finalized_at = canceled.finalized_at.expect("Terminal entry stamps finalized_at");

    let reopened = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::ReopenCanceled, actor, None)
        .await
        .unwrap();
    assert_eq!(reopened.status, OrderStatus::PendingPayment);
    // finalized_at is set exactly once and never overwritten.
    assert_eq!(reopened.finalized_at, Some(finalized_at));

    app.state
        .services
        .orders
        .transition(order_id, OrderAction::Cancel, actor, None)
        .await
        .unwrap();
    let re_canceled = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    assert_eq!(re_canceled.finalized_at, Some(finalized_at));
}

#[tokio::test]
async fn confirm_without_otp_gate_succeeds() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app, false, false).await;
    pay_in_full(&app, order_id, customer_id).await;

    let order = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Confirm, customer_id, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn otp_gated_confirm_requires_verified_code() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app, false, true).await;
    pay_in_full(&app, order_id, customer_id).await;

    // No code issued yet.
    let err = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Confirm, customer_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTP_NOT_FOUND");

    // Issued but unverified.
    app.state.services.otp.issue(order_id).await.unwrap();
    let err = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Confirm, customer_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OTP_INVALID");

    // Verified: confirmation goes through.
    let issued = app.state.services.otp.issue(order_id).await.unwrap();
    app.state
        .services
        .otp
        .verify(order_id, &issued.code)
        .await
        .unwrap();
    let order = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Confirm, customer_id, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn only_latest_otp_is_eligible() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app, false, true).await;
    pay_in_full(&app, order_id, customer_id).await;

    let first = app.state.services.otp.issue(order_id).await.unwrap();
    // Give the second issue a later created_at on coarse clocks.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let second = app.state.services.otp.issue(order_id).await.unwrap();

    // A superseded code can no longer verify (unless the digits collide).
    if first.code != second.code {
        let err = app
            .state
            .services
            .otp
            .verify(order_id, &first.code)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "OTP_INVALID");
    }

    app.state
        .services
        .otp
        .verify(order_id, &second.code)
        .await
        .unwrap();

    // Re-verification is a no-op.
    let again = app
        .state
        .services
        .otp
        .verify(order_id, &second.code)
        .await
        .unwrap();
    assert!(again.verified);

    // Verification alone never advanced the order.
    let order = app
        .state
        .services
        .orders
        .get_order(order_id)
        .await
        .unwrap()
        .order;
    assert_eq!(order.status, OrderStatus::PendingVerification);
}

#[tokio::test]
async fn complete_follows_confirmed() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app, false, false).await;
    pay_in_full(&app, order_id, customer_id).await;
    app.state
        .services
        .orders
        .transition(order_id, OrderAction::Confirm, customer_id, None)
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Complete, customer_id, None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert!(order.finalized_at.is_some());
}

#[tokio::test]
async fn every_transition_writes_exactly_one_history_entry() {
    let app = TestApp::new().await;
    let (order_id, customer_id) = checked_out_order(&app, true, false).await;
    let actor = Uuid::new_v4();

    app.state
        .services
        .orders
        .transition(order_id, OrderAction::Approve, actor, None)
        .await
        .unwrap();
    pay_in_full(&app, order_id, customer_id).await;
    app.state
        .services
        .orders
        .transition(order_id, OrderAction::Confirm, actor, None)
        .await
        .unwrap();

    let history = app
        .state
        .services
        .orders
        .get_history(order_id)
        .await
        .unwrap();
    // creation, approve, auto payment advance, confirm
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].from_status, OrderStatus::New);
    assert_eq!(history[0].to_status, OrderStatus::PendingApproval);
    assert_eq!(history[1].to_status, OrderStatus::PendingPayment);
    assert_eq!(history[2].to_status, OrderStatus::PendingConfirmation);
    assert_eq!(history[3].to_status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn paid_amount_must_match_exactly_to_advance() {
    let app = TestApp::new().await;
    let branch_id = app.seed_branch(false).await;
    let item = app.seed_item(dec!(10)).await;
    let customer_id = Uuid::new_v4();
    app.seed_balance(customer_id, dec!(100)).await;

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
                    quantity: 2,
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

    // Split $20 across balance ($5) and online ($15): partial settlement
    // must not advance the order.
    let outcome = app
        .state
        .services
        .payments
        .create_payment(
            order.id,
            "exact-key".to_string(),
            vec![
                orderflow_api::services::PaymentOptionInput {
                    method:
                        orderflow_api::entities::payment_transaction::TransactionMethod::Balance,
                    amount: dec!(5),
                },
                orderflow_api::services::PaymentOptionInput {
                    method: orderflow_api::entities::payment_transaction::TransactionMethod::OnlinePayment,
                    amount: dec!(15),
                },
            ],
            customer_id,
        )
        .await
        .unwrap();

    let mid = app
        .state
        .services
        .orders
        .get_order(order.id)
        .await
        .unwrap()
        .order;
    assert_eq!(mid.paid_amount, dec!(5));
    assert_eq!(mid.status, OrderStatus::PendingPayment);
    assert_eq!(mid.remaining_amount(), dec!(15));

    let online = outcome
        .transactions
        .iter()
        .find(|t| {
            t.method
                == orderflow_api::entities::payment_transaction::TransactionMethod::OnlinePayment
        })
        .unwrap();
    app.state
        .services
        .payments
        .settle_online_transaction(online.id, customer_id)
        .await
        .unwrap();

    let done = app
        .state
        .services
        .orders
        .get_order(order.id)
        .await
        .unwrap()
        .order;
    assert_eq!(done.paid_amount, done.total_amount);
    assert_eq!(done.status, OrderStatus::PendingConfirmation);
    assert_eq!(done.remaining_amount(), Decimal::ZERO);
}

#[tokio::test]
async fn expire_is_terminal() {
    let app = TestApp::new().await;
    let (order_id, _) = checked_out_order(&app, false, false).await;

    let order = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::Expire, Uuid::new_v4(), None)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Expired);
    assert!(order.finalized_at.is_some());

    let err = app
        .state
        .services
        .orders
        .transition(order_id, OrderAction::ReopenCanceled, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ORDER_STATUS_CONFLICT");
}
