use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shopping cart entity.
///
/// At most one open cart (`is_checked_out = false`, not soft-deleted) exists
/// per (customer, branch) pair. Checkout freezes the cart permanently.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub currency: String,
    pub is_checked_out: bool,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub sub_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl Model {
    /// Open means mutable: not checked out and not soft-deleted.
    pub fn is_open(&self) -> bool {
        !self.is_checked_out && self.deleted_at.is_none()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::cart_offer::Entity")]
    AppliedOffers,
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::cart_offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AppliedOffers.def()
    }
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
