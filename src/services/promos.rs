use crate::{
    cache::{CacheBackend, PROMO_LISTING_KEY},
    entities::{order, promo_code, Order, OrderModel, PromoCode},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Promo code service: applies and removes one flat discount code per order.
///
/// A code is one-time-per-customer across all their orders. Usage-count
/// mutations and order totals move in the same commit; the promo-listing
/// cache is invalidated after it.
#[derive(Clone)]
pub struct PromoService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    cache: Arc<dyn CacheBackend>,
}

impl PromoService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        cache: Arc<dyn CacheBackend>,
    ) -> Self {
        Self {
            db,
            event_sender,
            cache,
        }
    }

    /// Applies a promo code to an order.
    #[instrument(skip(self), fields(order_id = %order_id, code = %code))]
    pub async fn apply(
        &self,
        order_id: Uuid,
        code: &str,
        actor_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        if order.promo_code_id.is_some() {
            return Err(ServiceError::PromoAlreadyApplied);
        }

        let now = Utc::now();
        let promo = PromoCode::find()
            .filter(promo_code::Column::Code.eq(code))
            .one(&txn)
            .await?
            .filter(|promo| promo.is_active)
            .ok_or(ServiceError::PromoCodeNotActive)?;
        if !promo.is_within_window(now) {
            return Err(ServiceError::PromoCodeExpired);
        }
        if promo.is_exhausted() {
            return Err(ServiceError::PromoCodeNotActive);
        }

        // One-time-per-customer across all their orders.
        let used_before = Order::find()
            .filter(order::Column::CustomerId.eq(order.customer_id))
            .filter(order::Column::PromoCodeId.eq(promo.id))
            .filter(order::Column::Id.ne(order.id))
            .count(&txn)
            .await?;
        if used_before > 0 {
            return Err(ServiceError::PromoCodeAlreadyUsed);
        }

        let discount = order.total_discount + promo.discount_amount;
        apply_order_promo(&txn, &order, Some(promo.id), discount).await?;
        bump_usage_count(&txn, &promo, 1).await?;

        txn.commit().await?;
        self.invalidate_listing().await;
        self.event_sender
            .send_or_log(Event::PromoApplied {
                order_id,
                promo_code_id: promo.id,
            })
            .await;

        info!("Applied promo {} to order {}", promo.code, order_id);
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))
    }

    /// Removes a previously applied promo code; the exact inverse of
    /// [`apply`](Self::apply).
    #[instrument(skip(self), fields(order_id = %order_id, code = %code))]
    pub async fn remove(
        &self,
        order_id: Uuid,
        code: &str,
        actor_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;
        let promo_id = order.promo_code_id.ok_or(ServiceError::PromoNotApplied)?;

        let promo = PromoCode::find_by_id(promo_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::PromoNotApplied)?;
        if promo.code != code {
            return Err(ServiceError::PromoCodeMismatch);
        }

        let discount = (order.total_discount - promo.discount_amount).max(Decimal::ZERO);
        apply_order_promo(&txn, &order, None, discount).await?;
        bump_usage_count(&txn, &promo, -1).await?;

        txn.commit().await?;
        self.invalidate_listing().await;
        self.event_sender
            .send_or_log(Event::PromoRemoved {
                order_id,
                promo_code_id: promo.id,
            })
            .await;

        info!("Removed promo {} from order {}", promo.code, order_id);
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))
    }

    /// Post-commit cache invalidation; a failure only delays freshness.
    async fn invalidate_listing(&self) {
        if let Err(e) = self.cache.delete(PROMO_LISTING_KEY).await {
            warn!("Promo listing cache invalidation failed: {}", e);
        }
    }
}

/// Writes the order's promo linkage and recomputed totals under its
/// version guard.
async fn apply_order_promo(
    conn: &impl ConnectionTrait,
    order: &OrderModel,
    promo_code_id: Option<Uuid>,
    total_discount: Decimal,
) -> Result<(), ServiceError> {
    let mut active: order::ActiveModel = order.clone().into();
    active.promo_code_id = Set(promo_code_id);
    active.total_discount = Set(total_discount);
    active.total_amount = Set((order.sub_total - total_discount).max(Decimal::ZERO));
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
    Ok(())
}

/// Moves the usage counter by `delta`, guarded on its current value so
/// racing mutations fail deterministically instead of losing updates. The
/// counter never leaves `0..=max_members`.
async fn bump_usage_count(
    conn: &impl ConnectionTrait,
    promo: &promo_code::Model,
    delta: i32,
) -> Result<(), ServiceError> {
    let next = promo.usage_count + delta;
    if next < 0 {
        return Ok(());
    }
    if let Some(cap) = promo.max_members {
        if next > cap {
            return Err(ServiceError::PromoCodeNotActive);
        }
    }

    let mut active: promo_code::ActiveModel = promo.clone().into();
    active.usage_count = Set(next);
    active.updated_at = Set(Utc::now());

    let updated = PromoCode::update_many()
        .set(active)
        .filter(promo_code::Column::Id.eq(promo.id))
        .filter(promo_code::Column::UsageCount.eq(promo.usage_count))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::VersionConflict {
            entity: "promo_code",
            id: promo.id,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn promo(usage_count: i32, max_members: Option<i32>) -> promo_code::Model {
        let now = Utc::now();
        promo_code::Model {
            id: Uuid::new_v4(),
            code: "WELCOME10".to_string(),
            discount_amount: dec!(10),
            starts_at: now - chrono::Duration::days(1),
            ends_at: now + chrono::Duration::days(1),
            max_members,
            usage_count,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn window_check() {
        let promo = promo(0, None);
        assert!(promo.is_within_window(Utc::now()));
        assert!(!promo.is_within_window(Utc::now() + chrono::Duration::days(2)));
    }

    #[test]
    fn capped_promo_exhausts() {
        assert!(promo(5, Some(5)).is_exhausted());
        assert!(!promo(4, Some(5)).is_exhausted());
        assert!(!promo(1_000, None).is_exhausted());
    }
}
