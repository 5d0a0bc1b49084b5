use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pricing offer bound to a set of required catalog items.
///
/// `value` is interpreted per `kind`: the target price for fixed-price
/// offers, the flat amount for fixed discounts, the percentage for
/// percentage discounts.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub kind: OfferKind,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub value: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// An offer is applicable only while active and inside its window.
    pub fn is_applicable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now <= self.ends_at
    }
}

/// Offer pricing rule discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum OfferKind {
    #[sea_orm(string_value = "fixed_price")]
    FixedPrice,
    #[sea_orm(string_value = "fixed_discount")]
    FixedDiscount,
    #[sea_orm(string_value = "percentage_discount")]
    PercentageDiscount,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::offer_item::Entity")]
    OfferItems,
}

impl Related<super::offer_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OfferItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
