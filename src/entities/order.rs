use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order entity, created exactly once from a cart at checkout.
///
/// Mutated only through lifecycle transitions, payments and promo
/// application; never hard-deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_number: String,
    #[sea_orm(unique)]
    pub cart_id: Uuid,
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    pub currency: String,
    pub status: OrderStatus,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub sub_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_discount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub paid_amount: Decimal,
    #[sea_orm(nullable)]
    pub promo_code_id: Option<Uuid>,
    /// Confirmation requires a verified OTP (branch policy at checkout).
    pub otp_required: bool,
    /// Set exactly once, on first entry into a terminal status.
    #[sea_orm(nullable)]
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl Model {
    /// Amount still owed. Never negative.
    pub fn remaining_amount(&self) -> Decimal {
        (self.total_amount - self.paid_amount).max(Decimal::ZERO)
    }
}

/// Order status state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(24))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "new")]
    New,
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    #[sea_orm(string_value = "pending_payment")]
    PendingPayment,
    #[sea_orm(string_value = "pending_confirmation")]
    PendingConfirmation,
    #[sea_orm(string_value = "pending_verification")]
    PendingVerification,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "canceled")]
    Canceled,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl OrderStatus {
    /// Terminal states end the order's life; `finalized_at` is stamped on
    /// first entry into one of them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Rejected
                | OrderStatus::Canceled
                | OrderStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::PendingConfirmation => "pending_confirmation",
            OrderStatus::PendingVerification => "pending_verification",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Rejected => "rejected",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_history::Entity")]
    History,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
    #[sea_orm(has_many = "super::otp_code::Entity")]
    OtpCodes,
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::otp_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OtpCodes.def()
    }
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
