use crate::{
    entities::{otp_code, Order, OtpCode},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{Duration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// OTP gate for order confirmation.
///
/// Issues short-lived numeric codes; only the most recently issued code is
/// eligible for verification. Verification alone never advances order
/// status — the lifecycle service consumes the verified flag.
#[derive(Clone)]
pub struct OtpService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    ttl: Duration,
    code_length: u32,
}

impl OtpService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        ttl: Duration,
        code_length: u32,
    ) -> Self {
        Self {
            db,
            event_sender,
            ttl,
            code_length,
        }
    }

    /// Issues a fresh code for the order, superseding any earlier one.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn issue(&self, order_id: Uuid) -> Result<otp_code::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        let now = Utc::now();
        let row = otp_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            code: Set(generate_code(self.code_length)),
            expires_at: Set(now + self.ttl),
            verified: Set(false),
            created_at: Set(now),
        };
        let issued = row.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OtpIssued {
                order_id,
                customer_id: order.customer_id,
            })
            .await;
        info!("Issued confirmation code for order {}", order_id);
        Ok(issued)
    }

    /// Verifies a code against the latest issued one, exact match only.
    /// Re-verifying an already verified code is a no-op.
    #[instrument(skip(self, code), fields(order_id = %order_id))]
    pub async fn verify(&self, order_id: Uuid, code: &str) -> Result<otp_code::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let latest = OtpCode::find()
            .filter(otp_code::Column::OrderId.eq(order_id))
            .order_by_desc(otp_code::Column::CreatedAt)
            .one(&txn)
            .await?
            .ok_or(ServiceError::OtpNotFound)?;

        if latest.verified {
            txn.commit().await?;
            return Ok(latest);
        }
        if latest.is_expired_at(Utc::now()) {
            return Err(ServiceError::OtpExpired);
        }
        if latest.code != code {
            return Err(ServiceError::OtpInvalid);
        }

        let mut active: otp_code::ActiveModel = latest.into();
        active.verified = Set(true);
        let verified = active.update(&txn).await?;
        txn.commit().await?;

        info!("Verified confirmation code for order {}", order_id);
        Ok(verified)
    }
}

/// Zero-padded numeric code of the given number of digits.
fn generate_code(length: u32) -> String {
    let upper = 10u64.pow(length);
    let value = rand::thread_rng().gen_range(0..upper);
    format!("{:0width$}", value, width = length as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_has_requested_length() {
        for _ in 0..50 {
            let code = generate_code(6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn generated_code_pads_leading_zeros() {
        // 4-digit codes below 1000 must keep their leading zeros.
        for _ in 0..200 {
            let code = generate_code(4);
            assert_eq!(code.len(), 4);
        }
    }

    #[test]
    fn expiry_predicate() {
        let now = Utc::now();
        let row = otp_code::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            code: "123456".to_string(),
            expires_at: now + Duration::minutes(10),
            verified: false,
            created_at: now,
        };
        assert!(!row.is_expired_at(now));
        assert!(row.is_expired_at(now + Duration::minutes(11)));
    }
}
