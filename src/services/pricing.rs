//! Cart pricing engine.
//!
//! A pure function from line items and applied offers to totals: no I/O, no
//! clock, no hidden state. The result is invariant under permutation of the
//! offer list, and all arithmetic stays in `Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    entities::{cart_item, offer, offer_item, offer::OfferKind},
    errors::ServiceError,
};

/// One cart line as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub item_id: Uuid,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl From<&cart_item::Model> for PricedLine {
    fn from(item: &cart_item::Model) -> Self {
        Self {
            item_id: item.item_id,
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

/// One applied offer with its required catalog items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRule {
    pub offer_id: Uuid,
    pub kind: OfferKind,
    pub value: Decimal,
    pub item_ids: Vec<Uuid>,
}

impl OfferRule {
    pub fn from_parts(offer: &offer::Model, items: &[offer_item::Model]) -> Self {
        Self {
            offer_id: offer.id,
            kind: offer.kind,
            value: offer.value,
            item_ids: items
                .iter()
                .filter(|link| link.offer_id == offer.id)
                .map(|link| link.item_id)
                .collect(),
        }
    }
}

/// Computed cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub sub_total: Decimal,
    pub total_discount: Decimal,
    pub total_amount: Decimal,
}

impl CartTotals {
    pub fn zero() -> Self {
        Self {
            sub_total: Decimal::ZERO,
            total_discount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        }
    }
}

/// Computes subtotal, stacked discount and total for a cart.
///
/// Every required offer item must be present among the lines, else the
/// computation fails with `OFFER_ITEMS_MISSING`. An offer's base price is
/// the sum of the *unit prices* of its matched lines; quantities do not
/// multiply into the base. Discounts stack additively and the final total
/// is clamped at zero.
pub fn compute_totals(
    lines: &[PricedLine],
    offers: &[OfferRule],
) -> Result<CartTotals, ServiceError> {
    let sub_total: Decimal = lines.iter().map(PricedLine::line_total).sum();

    let mut total_discount = Decimal::ZERO;
    for rule in offers {
        total_discount += offer_discount(lines, rule)?;
    }

    Ok(CartTotals {
        sub_total,
        total_discount,
        total_amount: (sub_total - total_discount).max(Decimal::ZERO),
    })
}

fn offer_discount(lines: &[PricedLine], rule: &OfferRule) -> Result<Decimal, ServiceError> {
    let mut base = Decimal::ZERO;
    for item_id in &rule.item_ids {
        let line = lines
            .iter()
            .find(|line| line.item_id == *item_id)
            .ok_or(ServiceError::OfferItemsMissing(rule.offer_id))?;
        base += line.unit_price;
    }

    let discount = match rule.kind {
        OfferKind::FixedPrice => (base - rule.value).max(Decimal::ZERO),
        OfferKind::FixedDiscount => rule.value,
        OfferKind::PercentageDiscount => base * rule.value / Decimal::ONE_HUNDRED,
    };
    Ok(discount)
}
