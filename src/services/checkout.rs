use crate::{
    entities::{
        cart, cart_item, order, order_item, order::OrderStatus, Branch, CartItem, OrderModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::{load_open_cart, resolve_catalog_price},
        orders,
    },
};
use anyhow::anyhow;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Checkout coordinator: converts a mutable cart into an immutable order as
/// one atomic operation.
///
/// Everything happens inside a single transaction; any failure rolls back
/// the cart's checked-out flag together with the order and its lines. The
/// order-created (and, when needed, approval-requested) notifications are
/// dispatched only after commit.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Checks a cart out into a new order.
    ///
    /// The cart must still be open (`CART_NOT_FOUND` otherwise — a cart
    /// checks out at most once) and non-empty. Line items are snapshotted
    /// at this instant; a stored unit price that no longer matches the
    /// resolved catalog price on a non-price-editable item aborts the whole
    /// operation with `CART_ITEM_PRICE_MISMATCH`.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn create_order(
        &self,
        cart_id: Uuid,
        actor_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = load_open_cart(&txn, cart_id).await?;
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(&txn)
            .await?;
        if items.is_empty() {
            return Err(ServiceError::CartEmpty(cart_id));
        }

        let branch = Branch::find_by_id(cart.branch_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::Internal(anyhow!("branch {} not found", cart.branch_id)))?;

        // Freeze the cart before snapshotting; a concurrent checkout of the
        // same cart loses the version race and rolls back.
        let mut frozen: cart::ActiveModel = cart.clone().into();
        frozen.is_checked_out = Set(true);
        frozen.updated_at = Set(Utc::now());
        frozen.version = Set(cart.version + 1);
        let updated = cart::Entity::update_many()
            .set(frozen)
            .filter(cart::Column::Id.eq(cart.id))
            .filter(cart::Column::Version.eq(cart.version))
            .filter(cart::Column::IsCheckedOut.eq(false))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(ServiceError::VersionConflict {
                entity: "cart",
                id: cart.id,
            });
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let mut any_requires_approval = false;

        let mut snapshots = Vec::with_capacity(items.len());
        for line in &items {
            let (catalog, current_price) =
                resolve_catalog_price(&txn, cart.branch_id, line.item_id).await?;
            if line.unit_price != current_price && !catalog.is_price_editable {
                return Err(ServiceError::CartItemPriceMismatch {
                    item_id: line.item_id,
                });
            }
            any_requires_approval |= catalog.approval_required;

            snapshots.push(order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                item_id: Set(line.item_id),
                name: Set(catalog.name),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.total_price),
                created_at: Set(now),
            });
        }

        let fully_discounted = cart.total_amount == Decimal::ZERO;
        let otp_required = branch.otp_confirmation_required;
        let status = orders::initial_status(any_requires_approval, fully_discounted, otp_required);

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!(
                "ORD-{}",
                order_id.to_string()[..8].to_uppercase()
            )),
            cart_id: Set(cart.id),
            customer_id: Set(cart.customer_id),
            branch_id: Set(cart.branch_id),
            currency: Set(cart.currency.clone()),
            status: Set(status),
            sub_total: Set(cart.sub_total),
            total_discount: Set(cart.total_discount),
            total_amount: Set(cart.total_amount),
            paid_amount: Set(Decimal::ZERO),
            promo_code_id: Set(None),
            otp_required: Set(otp_required),
            finalized_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        };
        let order = order.insert(&txn).await?;

        for snapshot in snapshots {
            snapshot.insert(&txn).await?;
        }

        orders::record_transition(&txn, order_id, OrderStatus::New, status, actor_id, None)
            .await?;

        txn.commit().await?;

        if status == OrderStatus::PendingApproval {
            self.event_sender
                .send_or_log(Event::OrderApprovalRequested {
                    order_id,
                    branch_id: branch.id,
                    admin_channel: branch.admin_channel.clone(),
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id,
                customer_id: order.customer_id,
            })
            .await;

        info!(
            "Checkout completed: order {} ({}) created from cart {}",
            order_id, order.order_number, cart_id
        );
        Ok(order)
    }
}
