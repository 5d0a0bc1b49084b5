use crate::{
    entities::{
        customer_balance, order, payment, payment_transaction, CustomerBalance, Order, OrderModel,
        Payment, PaymentModel, PaymentTransaction,
        order::OrderStatus,
        payment::PaymentStatus,
        payment_transaction::{TransactionMethod, TransactionStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Payment allocation service.
///
/// Splits one payer attempt across funding instruments under a
/// caller-supplied idempotency key. A retried key replays the stored
/// payment; the storage UNIQUE constraint settles concurrent races. Failed
/// attempts are deliberately kept as `failed` payment rows for audit.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// One funding instrument in a payment request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentOptionInput {
    pub method: TransactionMethod,
    pub amount: Decimal,
}

/// A payment with its child transactions.
#[derive(Debug, Serialize)]
pub struct PaymentWithTransactions {
    pub payment: PaymentModel,
    pub transactions: Vec<payment_transaction::Model>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a payment settling the order's remaining amount.
    ///
    /// The options must sum to exactly `remaining_amount` and contain at
    /// most one entry per method. Balance options debit synchronously and
    /// land `completed`; online options land `pending` until the gateway
    /// settles them. The payment is `succeeded` iff every child transaction
    /// completed at creation.
    #[instrument(skip(self, options), fields(order_id = %order_id, idempotency_key = %idempotency_key))]
    pub async fn create_payment(
        &self,
        order_id: Uuid,
        idempotency_key: String,
        options: Vec<PaymentOptionInput>,
        actor_id: Uuid,
    ) -> Result<PaymentWithTransactions, ServiceError> {
        validate_options(&options)?;

        let txn = self.db.begin().await?;

        // Idempotent replay: an existing payment under this key is returned
        // unchanged, whatever its status. No second monetary effect.
        if let Some(existing) = Payment::find()
            .filter(payment::Column::IdempotencyKey.eq(idempotency_key.clone()))
            .one(&txn)
            .await?
        {
            let transactions = PaymentTransaction::find()
                .filter(payment_transaction::Column::PaymentId.eq(existing.id))
                .all(&txn)
                .await?;
            info!("Replayed payment {} for key {}", existing.id, idempotency_key);
            return Ok(PaymentWithTransactions {
                payment: existing,
                transactions,
            });
        }

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::PendingPayment {
            return Err(ServiceError::OrderStatusConflict {
                status: order.status.to_string(),
                action: "PAY".to_string(),
            });
        }

        let amount: Decimal = options.iter().map(|option| option.amount).sum();
        let remaining = order.remaining_amount();
        if amount != remaining {
            return Err(ServiceError::PaymentAmountMismatch {
                given: amount.to_string(),
                expected: remaining.to_string(),
            });
        }

        match self
            .allocate(&txn, &order, &idempotency_key, amount, &options, actor_id)
            .await
        {
            Ok((outcome, events)) => {
                txn.commit().await?;
                for event in events {
                    self.event_sender.send_or_log(event).await;
                }
                Ok(outcome)
            }
            Err(err) => {
                // Deliberate exception to all-or-nothing: roll the
                // allocation back, then keep a failed payment row carrying
                // the error so the attempt stays auditable.
                txn.rollback().await?;
                self.record_failed_attempt(&order, &idempotency_key, amount, &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Settles a pending online transaction (gateway callback entry point).
    /// Re-settling a completed transaction is a no-op.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn settle_online_transaction(
        &self,
        transaction_id: Uuid,
        actor_id: Uuid,
    ) -> Result<PaymentWithTransactions, ServiceError> {
        let txn = self.db.begin().await?;

        let row = PaymentTransaction::find_by_id(transaction_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::TransactionNotFound(transaction_id))?;
        if row.method != TransactionMethod::OnlinePayment {
            return Err(ServiceError::TransactionNotFound(transaction_id));
        }
        if row.status == TransactionStatus::Completed {
            let outcome = load_payment(&txn, row.payment_id).await?;
            txn.commit().await?;
            return Ok(outcome);
        }

        let amount = row.amount;
        let payment_id = row.payment_id;
        let order_id = row.order_id;

        let mut settled: payment_transaction::ActiveModel = row.into();
        settled.status = Set(TransactionStatus::Completed);
        settled.updated_at = Set(Utc::now());
        settled.update(&txn).await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        let order = apply_paid_amount(&txn, &order, amount).await?;
        let advance = orders::auto_advance_after_payment(&txn, &order, actor_id).await?;

        // The payment succeeds once no child transaction is left pending.
        let siblings = PaymentTransaction::find()
            .filter(payment_transaction::Column::PaymentId.eq(payment_id))
            .all(&txn)
            .await?;
        let all_completed = siblings
            .iter()
            .all(|t| t.status == TransactionStatus::Completed);

        let payment = Payment::find_by_id(payment_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::TransactionNotFound(transaction_id))?;
        let payment = if all_completed && payment.status != PaymentStatus::Succeeded {
            let mut active: payment::ActiveModel = payment.into();
            active.status = Set(PaymentStatus::Succeeded);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?
        } else {
            payment
        };

        txn.commit().await?;

        if payment.status == PaymentStatus::Succeeded {
            self.event_sender
                .send_or_log(Event::PaymentSucceeded {
                    payment_id,
                    order_id,
                })
                .await;
        }
        if let Some((_, event)) = advance {
            self.event_sender.send_or_log(event).await;
        }

        info!("Settled online transaction {}", transaction_id);
        Ok(PaymentWithTransactions {
            payment,
            transactions: siblings,
        })
    }

    /// Lists payments for an order, newest last.
    pub async fn list_payments(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PaymentModel>, ServiceError> {
        Ok(Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    async fn allocate(
        &self,
        txn: &DatabaseTransaction,
        order: &OrderModel,
        idempotency_key: &str,
        amount: Decimal,
        options: &[PaymentOptionInput],
        actor_id: Uuid,
    ) -> Result<(PaymentWithTransactions, Vec<Event>), ServiceError> {
        let now = Utc::now();
        let payment_id = Uuid::new_v4();

        let row = payment::ActiveModel {
            id: Set(payment_id),
            order_id: Set(order.id),
            customer_id: Set(order.customer_id),
            idempotency_key: Set(idempotency_key.to_string()),
            amount: Set(amount),
            status: Set(PaymentStatus::Pending),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        row.insert(txn)
            .await
            .map_err(|e| ServiceError::from_unique_violation(e, ServiceError::IdempotencyConflict))?;

        let mut transactions = Vec::with_capacity(options.len());
        let mut completed_total = Decimal::ZERO;
        for option in options {
            let status = match option.method {
                TransactionMethod::Balance => {
                    debit_balance(txn, order.customer_id, option.amount).await?;
                    completed_total += option.amount;
                    TransactionStatus::Completed
                }
                TransactionMethod::OnlinePayment => TransactionStatus::Pending,
            };
            let row = payment_transaction::ActiveModel {
                id: Set(Uuid::new_v4()),
                payment_id: Set(payment_id),
                order_id: Set(order.id),
                method: Set(option.method),
                amount: Set(option.amount),
                status: Set(status),
                created_at: Set(now),
                updated_at: Set(now),
            };
            transactions.push(row.insert(txn).await?);
        }

        let mut events = Vec::new();
        let mut updated_order = order.clone();
        if completed_total > Decimal::ZERO {
            updated_order = apply_paid_amount(txn, order, completed_total).await?;
            if let Some((advanced, event)) =
                orders::auto_advance_after_payment(txn, &updated_order, actor_id).await?
            {
                updated_order = advanced;
                events.push(event);
            }
        }

        let final_status = if transactions
            .iter()
            .all(|t| t.status == TransactionStatus::Completed)
        {
            PaymentStatus::Succeeded
        } else {
            PaymentStatus::Pending
        };
        let payment = Payment::find_by_id(payment_id)
            .one(txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(order.id))?;
        let mut active: payment::ActiveModel = payment.into();
        active.status = Set(final_status);
        active.updated_at = Set(Utc::now());
        let payment = active.update(txn).await?;

        events.insert(
            0,
            match final_status {
                PaymentStatus::Succeeded => Event::PaymentSucceeded {
                    payment_id,
                    order_id: order.id,
                },
                _ => Event::PaymentPending {
                    payment_id,
                    order_id: order.id,
                },
            },
        );

        info!(
            "Created payment {} for order {} ({} transaction(s), status {:?})",
            payment_id,
            updated_order.id,
            transactions.len(),
            final_status
        );
        Ok((
            PaymentWithTransactions {
                payment,
                transactions,
            },
            events,
        ))
    }

    /// Commits a `failed` payment row after the allocation rolled back.
    /// Best effort: losing the race against a concurrent attempt under the
    /// same key only costs the audit row, never correctness.
    async fn record_failed_attempt(
        &self,
        order: &OrderModel,
        idempotency_key: &str,
        amount: Decimal,
        err: &ServiceError,
    ) {
        let now = Utc::now();
        let payment_id = Uuid::new_v4();
        let row = payment::ActiveModel {
            id: Set(payment_id),
            order_id: Set(order.id),
            customer_id: Set(order.customer_id),
            idempotency_key: Set(idempotency_key.to_string()),
            amount: Set(amount),
            status: Set(PaymentStatus::Failed),
            error_message: Set(Some(format!("{}: {}", err.code(), err))),
            created_at: Set(now),
            updated_at: Set(now),
        };
        match row.insert(&*self.db).await {
            Ok(_) => {
                self.event_sender
                    .send_or_log(Event::PaymentFailed {
                        payment_id,
                        order_id: order.id,
                    })
                    .await;
            }
            Err(e) => {
                warn!(
                    "Could not record failed payment attempt for order {}: {}",
                    order.id, e
                );
            }
        }
    }
}

/// Validates the option list shape: non-empty, positive amounts, at most
/// one option per method.
fn validate_options(options: &[PaymentOptionInput]) -> Result<(), ServiceError> {
    if options.is_empty() {
        return Err(ServiceError::PaymentOptionsEmpty);
    }
    for option in options {
        if option.amount <= Decimal::ZERO {
            return Err(ServiceError::validation(
                "Payment option amount must be positive",
                Some("amount"),
            ));
        }
    }
    let balance_count = options
        .iter()
        .filter(|o| o.method == TransactionMethod::Balance)
        .count();
    let online_count = options.len() - balance_count;
    if balance_count > 1 {
        return Err(ServiceError::PaymentOptionDuplicate(
            TransactionMethod::Balance.as_str().to_string(),
        ));
    }
    if online_count > 1 {
        return Err(ServiceError::PaymentOptionDuplicate(
            TransactionMethod::OnlinePayment.as_str().to_string(),
        ));
    }
    Ok(())
}

/// Atomic stored-value debit. Fails wholly with `INSUFFICIENT_BALANCE`;
/// the version guard turns a racing debit into a retryable conflict.
async fn debit_balance(
    conn: &impl ConnectionTrait,
    customer_id: Uuid,
    amount: Decimal,
) -> Result<(), ServiceError> {
    let account = CustomerBalance::find_by_id(customer_id)
        .one(conn)
        .await?
        .ok_or(ServiceError::InsufficientBalance(customer_id))?;
    if account.balance < amount {
        return Err(ServiceError::InsufficientBalance(customer_id));
    }

    let mut active: customer_balance::ActiveModel = account.clone().into();
    active.balance = Set(account.balance - amount);
    active.updated_at = Set(Utc::now());
    active.version = Set(account.version + 1);

    let updated = CustomerBalance::update_many()
        .set(active)
        .filter(customer_balance::Column::CustomerId.eq(customer_id))
        .filter(customer_balance::Column::Version.eq(account.version))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::VersionConflict {
            entity: "customer_balance",
            id: customer_id,
        });
    }
    Ok(())
}

/// Adds settled funds to the order under its version guard.
async fn apply_paid_amount(
    conn: &impl ConnectionTrait,
    order: &OrderModel,
    amount: Decimal,
) -> Result<OrderModel, ServiceError> {
    let mut active: order::ActiveModel = order.clone().into();
    active.paid_amount = Set(order.paid_amount + amount);
    active.updated_at = Set(Utc::now());
    active.version = Set(order.version + 1);

    let updated = Order::update_many()
        .set(active)
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Version.eq(order.version))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::VersionConflict {
            entity: "order",
            id: order.id,
        });
    }
    Order::find_by_id(order.id)
        .one(conn)
        .await?
        .ok_or(ServiceError::OrderNotFound(order.id))
}

async fn load_payment(
    conn: &impl ConnectionTrait,
    payment_id: Uuid,
) -> Result<PaymentWithTransactions, ServiceError> {
    let payment = Payment::find_by_id(payment_id)
        .one(conn)
        .await?
        .ok_or(ServiceError::TransactionNotFound(payment_id))?;
    let transactions = PaymentTransaction::find()
        .filter(payment_transaction::Column::PaymentId.eq(payment_id))
        .all(conn)
        .await?;
    Ok(PaymentWithTransactions {
        payment,
        transactions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn option(method: TransactionMethod, amount: Decimal) -> PaymentOptionInput {
        PaymentOptionInput { method, amount }
    }

    #[test]
    fn empty_options_rejected() {
        let err = validate_options(&[]).unwrap_err();
        assert_eq!(err.code(), "PAYMENT_OPTIONS_EMPTY");
    }

    #[test]
    fn duplicate_methods_rejected() {
        let err = validate_options(&[
            option(TransactionMethod::Balance, dec!(5)),
            option(TransactionMethod::Balance, dec!(5)),
        ])
        .unwrap_err();
        assert_eq!(err.code(), "PAYMENT_OPTION_DUPLICATE");
    }

    #[test]
    fn one_of_each_method_accepted() {
        assert!(validate_options(&[
            option(TransactionMethod::Balance, dec!(5)),
            option(TransactionMethod::OnlinePayment, dec!(7)),
        ])
        .is_ok());
    }

    #[test]
    fn non_positive_amount_rejected() {
        let err = validate_options(&[option(TransactionMethod::Balance, dec!(0))]).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
