use crate::{
    entities::{
        order, order_history, order_item, otp_code, Order, OrderHistory, OrderItem, OrderModel,
        OtpCode,
    },
    entities::order::OrderStatus,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tracing::{info, instrument};
use uuid::Uuid;

/// Caller-initiated lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    Approve,
    Reject,
    Cancel,
    Confirm,
    ReopenCanceled,
    Complete,
    Expire,
}

/// Order lifecycle service: the status state machine.
///
/// Every transition runs in one transaction, appends exactly one history
/// row, bumps the order version, and emits exactly one status-changed event
/// after commit.
#[derive(Clone)]
pub struct OrderLifecycleService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderLifecycleService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Drives one lifecycle action against an order.
    #[instrument(skip(self), fields(order_id = %order_id, action = %action))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        action: OrderAction,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        if action == OrderAction::Reject && reason.as_deref().map_or(true, str::is_empty) {
            return Err(ServiceError::validation(
                "A reason is mandatory when rejecting an order",
                Some("reason"),
            ));
        }

        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        let target = target_status(order.status, action)?;

        if action == OrderAction::Confirm && order.otp_required {
            require_verified_otp(&txn, order_id).await?;
        }

        let (updated, event) = apply_transition(&txn, &order, target, actor_id, reason).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(event).await;
        info!(
            "Order {} transitioned {} -> {}",
            order_id, order.status, updated.status
        );
        Ok(updated)
    }

    /// Retrieves an order with its line items.
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(OrderWithItems { order, items })
    }

    /// Returns the append-only transition history, oldest first.
    pub async fn get_history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_history::Model>, ServiceError> {
        Ok(OrderHistory::find()
            .filter(order_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_history::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

/// Resolves the target status for a (status, action) pair. Incompatible
/// pairs fail `ORDER_STATUS_CONFLICT`.
pub(crate) fn target_status(
    status: OrderStatus,
    action: OrderAction,
) -> Result<OrderStatus, ServiceError> {
    use OrderAction::*;
    use OrderStatus::*;

    let target = match (status, action) {
        (PendingApproval, Approve) => PendingPayment,
        (PendingApproval, Reject) => Rejected,
        (New | PendingPayment | PendingApproval, Cancel) => Canceled,
        (PendingConfirmation | PendingVerification, Confirm) => Confirmed,
        (Canceled, ReopenCanceled) => PendingPayment,
        (Confirmed, Complete) => Completed,
        (
            New | PendingApproval | PendingPayment | PendingConfirmation | PendingVerification,
            Expire,
        ) => Expired,
        _ => {
            return Err(ServiceError::OrderStatusConflict {
                status: status.to_string(),
                action: action.to_string(),
            })
        }
    };
    Ok(target)
}

/// Initial status for a freshly checked-out order.
///
/// Approval-required items take precedence; a fully discounted order skips
/// payment and goes straight to confirmation (verification when the branch
/// mandates OTP); everything else awaits payment.
pub(crate) fn initial_status(
    any_item_requires_approval: bool,
    fully_discounted: bool,
    otp_required: bool,
) -> OrderStatus {
    if any_item_requires_approval {
        OrderStatus::PendingApproval
    } else if fully_discounted {
        if otp_required {
            OrderStatus::PendingVerification
        } else {
            OrderStatus::PendingConfirmation
        }
    } else {
        OrderStatus::PendingPayment
    }
}

/// Applies a transition under the order's optimistic version guard:
/// status write, `finalized_at` stamp on first terminal entry, and exactly
/// one history row. Returns the updated order plus the status-changed event
/// for the caller to dispatch after commit.
pub(crate) async fn apply_transition(
    conn: &impl ConnectionTrait,
    current: &OrderModel,
    target: OrderStatus,
    actor_id: Uuid,
    reason: Option<String>,
) -> Result<(OrderModel, Event), ServiceError> {
    let now = Utc::now();

    let mut active: order::ActiveModel = current.clone().into();
    active.status = Set(target);
    active.updated_at = Set(now);
    active.version = Set(current.version + 1);
    if target.is_terminal() && current.finalized_at.is_none() {
        active.finalized_at = Set(Some(now));
    }

    let updated = Order::update_many()
        .set(active)
        .filter(order::Column::Id.eq(current.id))
        .filter(order::Column::Version.eq(current.version))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::VersionConflict {
            entity: "order",
            id: current.id,
        });
    }

    record_transition(conn, current.id, current.status, target, actor_id, reason).await?;

    let order = Order::find_by_id(current.id)
        .one(conn)
        .await?
        .ok_or(ServiceError::OrderNotFound(current.id))?;
    let event = Event::OrderStatusChanged {
        order_id: order.id,
        customer_id: order.customer_id,
        old_status: current.status.to_string(),
        new_status: target.to_string(),
    };
    Ok((order, event))
}

/// Appends one immutable history row. The sole write path to the audit log.
pub(crate) async fn record_transition(
    conn: &impl ConnectionTrait,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
    actor_id: Uuid,
    reason: Option<String>,
) -> Result<(), ServiceError> {
    let entry = order_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        from_status: Set(from),
        to_status: Set(to),
        actor_id: Set(actor_id),
        reason: Set(reason),
        created_at: Set(Utc::now()),
    };
    entry.insert(conn).await?;
    Ok(())
}

/// Fires the automatic payment-completion transition when the order is
/// awaiting payment and `paid_amount` equals `total_amount` exactly.
/// Returns the event to dispatch after commit, or None when nothing fired.
pub(crate) async fn auto_advance_after_payment(
    conn: &impl ConnectionTrait,
    order: &OrderModel,
    actor_id: Uuid,
) -> Result<Option<(OrderModel, Event)>, ServiceError> {
    if order.status != OrderStatus::PendingPayment || order.paid_amount != order.total_amount {
        return Ok(None);
    }
    let target = if order.otp_required {
        OrderStatus::PendingVerification
    } else {
        OrderStatus::PendingConfirmation
    };
    apply_transition(conn, order, target, actor_id, None)
        .await
        .map(Some)
}

/// Confirmation gate: the order's latest OTP must exist and be verified.
async fn require_verified_otp(
    conn: &impl ConnectionTrait,
    order_id: Uuid,
) -> Result<(), ServiceError> {
    let latest = OtpCode::find()
        .filter(otp_code::Column::OrderId.eq(order_id))
        .order_by_desc(otp_code::Column::CreatedAt)
        .one(conn)
        .await?
        .ok_or(ServiceError::OtpNotFound)?;
    if !latest.verified {
        return Err(ServiceError::OtpInvalid);
    }
    Ok(())
}

/// Order with line items
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: OrderModel,
    pub items: Vec<order_item::Model>,
}
