use crate::{
    entities::{
        branch_price, cart, cart_item, cart_offer, catalog_item, offer, offer_item, BranchPrice,
        Cart, CartItem, CartModel, CartOffer, CatalogItem, Offer, OfferItem,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::{self, OfferRule, PricedLine},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Shopping cart service.
///
/// Owns the mutable pre-checkout aggregate: line items and applied offers
/// for one (customer, branch) pair. Totals are recomputed through the
/// pricing engine after every mutation, inside the same transaction.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>, currency: String) -> Self {
        Self {
            db,
            event_sender,
            currency,
        }
    }

    /// Returns the single open cart for the pair, creating it lazily.
    ///
    /// A second open cart for the same (customer, branch) is never created;
    /// callers always land on the existing one.
    #[instrument(skip(self))]
    pub async fn find_or_create_cart(
        &self,
        customer_id: Uuid,
        branch_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .filter(cart::Column::BranchId.eq(branch_id))
            .filter(cart::Column::IsCheckedOut.eq(false))
            .filter(cart::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
        {
            return Ok(cart);
        }

        let cart_id = Uuid::new_v4();
        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(cart_id),
            customer_id: Set(customer_id),
            branch_id: Set(branch_id),
            currency: Set(self.currency.clone()),
            is_checked_out: Set(false),
            sub_total: Set(Decimal::ZERO),
            total_discount: Set(Decimal::ZERO),
            total_amount: Set(Decimal::ZERO),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        };
        let cart = cart.insert(&*self.db).await?;

        self.event_sender.send_or_log(Event::CartCreated(cart_id)).await;
        info!("Created cart {} for customer {}", cart_id, customer_id);
        Ok(cart)
    }

    /// Adds items to the cart, merging quantities for items already present.
    ///
    /// New items must exist and be active; their unit price is the branch
    /// override when one exists, else the catalog price. Unresolvable ids
    /// fail the whole call with `ITEM_NOT_FOUND`.
    #[instrument(skip(self, input))]
    pub async fn add_or_replace_items(
        &self,
        cart_id: Uuid,
        input: AddCartItemsInput,
    ) -> Result<CartModel, ServiceError> {
        input.validate()?;
        if input.items.is_empty() {
            return Err(ServiceError::validation(
                "items must not be empty",
                Some("items"),
            ));
        }

        // Merge duplicate ids in the request before touching the cart.
        let mut requested: BTreeMap<Uuid, i32> = BTreeMap::new();
        for line in &input.items {
            *requested.entry(line.item_id).or_insert(0) += line.quantity;
        }

        let txn = self.db.begin().await?;
        let cart = load_open_cart(&txn, cart_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(&txn)
            .await?;

        let now = Utc::now();
        for (item_id, quantity) in requested {
            match existing.iter().find(|line| line.item_id == item_id) {
                Some(line) => {
                    let merged = line.quantity + quantity;
                    let unit_price = line.unit_price;
                    let mut line: cart_item::ActiveModel = line.clone().into();
                    line.quantity = Set(merged);
                    line.total_price = Set(unit_price * Decimal::from(merged));
                    line.updated_at = Set(now);
                    line.update(&txn).await?;
                }
                None => {
                    let (_, unit_price) =
                        resolve_catalog_price(&txn, cart.branch_id, item_id).await?;
                    let line = cart_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        cart_id: Set(cart_id),
                        item_id: Set(item_id),
                        quantity: Set(quantity),
                        unit_price: Set(unit_price),
                        total_price: Set(unit_price * Decimal::from(quantity)),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };
                    line.insert(&txn).await?;
                }
            }
        }

        let count = input.items.len();
        let updated = recompute_cart_totals(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemsAdded { cart_id, count })
            .await;
        info!("Added {} item line(s) to cart {}", count, cart_id);
        Ok(updated)
    }

    /// Removes one line from the cart and recomputes totals.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, cart_id: Uuid, item_id: Uuid) -> Result<CartModel, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = load_open_cart(&txn, cart_id).await?;

        let deleted = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ItemId.eq(item_id))
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(ServiceError::ItemNotFound(item_id));
        }

        let updated = recompute_cart_totals(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved { cart_id, item_id })
            .await;
        Ok(updated)
    }

    /// Applies an offer to the cart.
    ///
    /// Duplicates fail `OFFER_ALREADY_APPLIED`; inactive or out-of-window
    /// offers fail `OFFER_NOT_FOUND`. The totals recomputation enforces that
    /// every required offer item is present.
    #[instrument(skip(self))]
    pub async fn apply_offer(&self, cart_id: Uuid, offer_id: Uuid) -> Result<CartModel, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = load_open_cart(&txn, cart_id).await?;

        let already = CartOffer::find()
            .filter(cart_offer::Column::CartId.eq(cart_id))
            .filter(cart_offer::Column::OfferId.eq(offer_id))
            .one(&txn)
            .await?;
        if already.is_some() {
            return Err(ServiceError::OfferAlreadyApplied(offer_id));
        }

        let offer = Offer::find_by_id(offer_id)
            .one(&txn)
            .await?
            .filter(|offer| offer.is_applicable_at(Utc::now()))
            .ok_or(ServiceError::OfferNotFound(offer_id))?;

        let applied = cart_offer::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(cart_id),
            offer_id: Set(offer.id),
            applied_at: Set(Utc::now()),
        };
        applied.insert(&txn).await?;

        let updated = recompute_cart_totals(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartOfferApplied { cart_id, offer_id })
            .await;
        info!("Applied offer {} to cart {}", offer_id, cart_id);
        Ok(updated)
    }

    /// Removes an applied offer from the cart.
    #[instrument(skip(self))]
    pub async fn remove_offer(
        &self,
        cart_id: Uuid,
        offer_id: Uuid,
    ) -> Result<CartModel, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = load_open_cart(&txn, cart_id).await?;

        let deleted = CartOffer::delete_many()
            .filter(cart_offer::Column::CartId.eq(cart_id))
            .filter(cart_offer::Column::OfferId.eq(offer_id))
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(ServiceError::OfferNotApplied(offer_id));
        }

        let updated = recompute_cart_totals(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartOfferRemoved { cart_id, offer_id })
            .await;
        Ok(updated)
    }

    /// Retrieves a cart with its items and applied offers.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .filter(|cart| cart.deleted_at.is_none())
            .ok_or(ServiceError::CartNotFound(cart_id))?;

        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(&*self.db)
            .await?;
        let offers = applied_offers(&*self.db, cart_id).await?;

        Ok(CartWithItems {
            cart,
            items,
            offers: offers.into_iter().map(|(offer, _)| offer).collect(),
        })
    }

    /// Soft-deletes an open cart.
    #[instrument(skip(self))]
    pub async fn delete_cart(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let cart = load_open_cart(&txn, cart_id).await?;

        let mut active: cart::ActiveModel = cart.into();
        active.deleted_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::CartDeleted(cart_id)).await;
        info!("Deleted cart {}", cart_id);
        Ok(())
    }
}

/// Loads a cart that is still mutable; anything else is `CART_NOT_FOUND`.
pub(crate) async fn load_open_cart(
    conn: &impl ConnectionTrait,
    cart_id: Uuid,
) -> Result<CartModel, ServiceError> {
    Cart::find_by_id(cart_id)
        .one(conn)
        .await?
        .filter(CartModel::is_open)
        .ok_or(ServiceError::CartNotFound(cart_id))
}

/// Resolves an active catalog item and its effective unit price for a
/// branch: the branch override wins over the catalog price.
pub(crate) async fn resolve_catalog_price(
    conn: &impl ConnectionTrait,
    branch_id: Uuid,
    item_id: Uuid,
) -> Result<(catalog_item::Model, Decimal), ServiceError> {
    let item = CatalogItem::find_by_id(item_id)
        .one(conn)
        .await?
        .filter(|item| item.is_active)
        .ok_or(ServiceError::ItemNotFound(item_id))?;

    let override_price = BranchPrice::find()
        .filter(branch_price::Column::BranchId.eq(branch_id))
        .filter(branch_price::Column::ItemId.eq(item_id))
        .one(conn)
        .await?
        .map(|row| row.price);

    let price = override_price.unwrap_or(item.price);
    Ok((item, price))
}

/// Loads the offers applied to a cart together with their required items.
pub(crate) async fn applied_offers(
    conn: &impl ConnectionTrait,
    cart_id: Uuid,
) -> Result<Vec<(offer::Model, Vec<offer_item::Model>)>, ServiceError> {
    let links = CartOffer::find()
        .filter(cart_offer::Column::CartId.eq(cart_id))
        .all(conn)
        .await?;
    if links.is_empty() {
        return Ok(Vec::new());
    }

    let offer_ids: Vec<Uuid> = links.iter().map(|link| link.offer_id).collect();
    let offers = Offer::find()
        .filter(offer::Column::Id.is_in(offer_ids.clone()))
        .all(conn)
        .await?;
    let required = OfferItem::find()
        .filter(offer_item::Column::OfferId.is_in(offer_ids))
        .all(conn)
        .await?;

    Ok(offers
        .into_iter()
        .map(|offer| {
            let items = required
                .iter()
                .filter(|link| link.offer_id == offer.id)
                .cloned()
                .collect();
            (offer, items)
        })
        .collect())
}

/// Recomputes cart totals through the pricing engine and writes them back
/// under the cart's optimistic version guard.
async fn recompute_cart_totals(
    conn: &impl ConnectionTrait,
    cart: &CartModel,
) -> Result<CartModel, ServiceError> {
    let items = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .all(conn)
        .await?;
    let offers = applied_offers(conn, cart.id).await?;

    let lines: Vec<PricedLine> = items.iter().map(PricedLine::from).collect();
    let rules: Vec<OfferRule> = offers
        .iter()
        .map(|(offer, required)| OfferRule::from_parts(offer, required))
        .collect();
    let totals = pricing::compute_totals(&lines, &rules)?;

    let mut active: cart::ActiveModel = cart.clone().into();
    active.sub_total = Set(totals.sub_total);
    active.total_discount = Set(totals.total_discount);
    active.total_amount = Set(totals.total_amount);
    active.updated_at = Set(Utc::now());
    active.version = Set(cart.version + 1);

    let updated = Cart::update_many()
        .set(active)
        .filter(cart::Column::Id.eq(cart.id))
        .filter(cart::Column::Version.eq(cart.version))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::VersionConflict {
            entity: "cart",
            id: cart.id,
        });
    }

    Cart::find_by_id(cart.id)
        .one(conn)
        .await?
        .ok_or(ServiceError::CartNotFound(cart.id))
}

/// Input for adding items to a cart
#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemsInput {
    #[validate]
    pub items: Vec<CartItemInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CartItemInput {
    pub item_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Cart with items and applied offers
#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: CartModel,
    pub items: Vec<cart_item::Model>,
    pub offers: Vec<offer::Model>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn cart_item_input_rejects_zero_quantity() {
        let input = AddCartItemsInput {
            items: vec![CartItemInput {
                item_id: Uuid::new_v4(),
                quantity: 0,
            }],
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn cart_item_input_accepts_positive_quantity() {
        let input = AddCartItemsInput {
            items: vec![CartItemInput {
                item_id: Uuid::new_v4(),
                quantity: 3,
            }],
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn open_cart_predicate() {
        let now = Utc::now();
        let cart = CartModel {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            currency: "USD".to_string(),
            is_checked_out: false,
            sub_total: dec!(0),
            total_discount: dec!(0),
            total_amount: dec!(0),
            deleted_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        assert!(cart.is_open());
        assert!(!CartModel {
            is_checked_out: true,
            ..cart.clone()
        }
        .is_open());
        assert!(!CartModel {
            deleted_at: Some(now),
            ..cart
        }
        .is_open());
    }
}
