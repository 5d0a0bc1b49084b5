use sea_orm::error::{DbErr, SqlErr};
use serde::Serialize;
use uuid::Uuid;

/// Structured error payload returned to callers.
///
/// Callers branch on `code`, never on `message` text. `field` is set for
/// validation errors that can be pinned to a single input field.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Cart {0} not found")]
    CartNotFound(Uuid),

    #[error("Cart {0} has no items")]
    CartEmpty(Uuid),

    #[error("Catalog item {0} not found or inactive")]
    ItemNotFound(Uuid),

    #[error("Stored price for item {item_id} no longer matches the catalog price")]
    CartItemPriceMismatch { item_id: Uuid },

    #[error("Offer {0} not found or not currently active")]
    OfferNotFound(Uuid),

    #[error("Offer {0} is already applied to this cart")]
    OfferAlreadyApplied(Uuid),

    #[error("Offer {0} requires items that are missing from the cart")]
    OfferItemsMissing(Uuid),

    #[error("Offer {0} is not applied to this cart")]
    OfferNotApplied(Uuid),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Action {action} is not allowed while the order is {status}")]
    OrderStatusConflict { status: String, action: String },

    #[error("Concurrent modification of {entity} {id}")]
    VersionConflict { entity: &'static str, id: Uuid },

    #[error("Payment amount {given} does not match the remaining amount {expected}")]
    PaymentAmountMismatch { given: String, expected: String },

    #[error("Payment options must not be empty")]
    PaymentOptionsEmpty,

    #[error("Payment option {0} given more than once")]
    PaymentOptionDuplicate(String),

    #[error("Idempotency key already used by a concurrent request")]
    IdempotencyConflict,

    #[error("Insufficient balance for customer {0}")]
    InsufficientBalance(Uuid),

    #[error("Payment transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("A promo code is already applied to this order")]
    PromoAlreadyApplied,

    #[error("Promo code is outside its validity window")]
    PromoCodeExpired,

    #[error("Promo code is not active")]
    PromoCodeNotActive,

    #[error("Promo code was already used by this customer")]
    PromoCodeAlreadyUsed,

    #[error("No promo code is applied to this order")]
    PromoNotApplied,

    #[error("Promo code does not match the one applied to this order")]
    PromoCodeMismatch,

    #[error("No confirmation code has been issued for this order")]
    OtpNotFound,

    #[error("Confirmation code does not match")]
    OtpInvalid,

    #[error("Confirmation code has expired")]
    OtpExpired,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Convenience constructor for field-level validation failures.
    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    /// Stable machine code for the error. The single source of truth for
    /// error-to-code mapping; messages may change, codes may not.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::CartNotFound(_) => "CART_NOT_FOUND",
            Self::CartEmpty(_) => "CART_EMPTY",
            Self::ItemNotFound(_) => "ITEM_NOT_FOUND",
            Self::CartItemPriceMismatch { .. } => "CART_ITEM_PRICE_MISMATCH",
            Self::OfferNotFound(_) => "OFFER_NOT_FOUND",
            Self::OfferAlreadyApplied(_) => "OFFER_ALREADY_APPLIED",
            Self::OfferItemsMissing(_) => "OFFER_ITEMS_MISSING",
            Self::OfferNotApplied(_) => "OFFER_NOT_APPLIED",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::OrderStatusConflict { .. } => "ORDER_STATUS_CONFLICT",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::PaymentAmountMismatch { .. } => "PAYMENT_AMOUNT_MISMATCH",
            Self::PaymentOptionsEmpty => "PAYMENT_OPTIONS_EMPTY",
            Self::PaymentOptionDuplicate(_) => "PAYMENT_OPTION_DUPLICATE",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::InsufficientBalance(_) => "INSUFFICIENT_BALANCE",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::PromoAlreadyApplied => "PROMO_ALREADY_APPLIED",
            Self::PromoCodeExpired => "PROMO_CODE_EXPIRED",
            Self::PromoCodeNotActive => "PROMO_CODE_NOT_ACTIVE",
            Self::PromoCodeAlreadyUsed => "PROMO_CODE_ALREADY_USED",
            Self::PromoNotApplied => "PROMO_NOT_APPLIED",
            Self::PromoCodeMismatch => "PROMO_CODE_MISMATCH",
            Self::OtpNotFound => "OTP_NOT_FOUND",
            Self::OtpInvalid => "OTP_INVALID",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for conflict-class errors a caller may retry after re-reading
    /// state (stale version, racing idempotency-key insert).
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(
            self,
            Self::VersionConflict { .. } | Self::IdempotencyConflict
        )
    }

    /// Structured body for transport layers. Internal errors get a generic
    /// message so implementation details never leak.
    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            Self::DatabaseError(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        let field = match self {
            Self::Validation { field, .. } => field.clone(),
            _ => None,
        };
        ErrorBody {
            code: self.code(),
            message,
            field,
        }
    }

    /// Maps a database error raised by an insert against a unique index to
    /// the given conflict error; anything else stays a database error.
    pub fn from_unique_violation(err: DbErr, conflict: ServiceError) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => conflict,
            _ => ServiceError::DatabaseError(err),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err
            .field_errors()
            .keys()
            .next()
            .map(|field| (*field).to_string());
        ServiceError::Validation {
            message: err.to_string(),
            field,
        }
    }
}
