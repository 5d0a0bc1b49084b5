use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use orderflow_api::{
    config::AppConfig,
    db,
    entities::{branch, branch_price, catalog_item, customer_balance, offer, offer_item, promo_code},
    entities::offer::OfferKind,
    events::{process_events, EventSender},
    notifications::{Notifier, RecordingNotifier},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Test harness: application state backed by an in-memory SQLite database
/// with the full schema migrated, plus a recording notifier wired to the
/// event loop.
pub struct TestApp {
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.auto_migrate = true;
        // One connection: every handle must see the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let db = db::connect(&cfg).await.expect("Failed to connect test db");

        let (event_sender, rx) = EventSender::channel(64);
        let notifier = Arc::new(RecordingNotifier::default());
        let loop_notifier: Arc<dyn Notifier> = notifier.clone();
        let event_task = tokio::spawn(process_events(rx, loop_notifier));

        let state = AppState::new(Arc::new(db), Arc::new(cfg), Arc::new(event_sender));

        Self {
            state,
            notifier,
            _event_task: event_task,
        }
    }

    /// Gives the event loop a beat to drain before asserting notifications.
    pub async fn drain_events(&self) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    pub async fn seed_branch(&self, otp_required: bool) -> Uuid {
        let branch_id = Uuid::new_v4();
        let now = Utc::now();
        branch::ActiveModel {
            id: Set(branch_id),
            name: Set("Downtown".to_string()),
            otp_confirmation_required: Set(otp_required),
            admin_channel: Set(Some("branch-admins".to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("Failed to seed branch");
        branch_id
    }

    pub async fn seed_item(&self, price: Decimal) -> Uuid {
        self.seed_item_with(price, true, false, false).await
    }

    pub async fn seed_item_with(
        &self,
        price: Decimal,
        is_active: bool,
        is_price_editable: bool,
        approval_required: bool,
    ) -> Uuid {
        let item_id = Uuid::new_v4();
        let now = Utc::now();
        catalog_item::ActiveModel {
            id: Set(item_id),
            name: Set(format!("Item {}", &item_id.to_string()[..8])),
            price: Set(price),
            is_active: Set(is_active),
            is_price_editable: Set(is_price_editable),
            approval_required: Set(approval_required),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("Failed to seed catalog item");
        item_id
    }

    pub async fn seed_branch_price(&self, branch_id: Uuid, item_id: Uuid, price: Decimal) {
        let now = Utc::now();
        branch_price::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch_id),
            item_id: Set(item_id),
            price: Set(price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("Failed to seed branch price");
    }

    pub async fn set_catalog_price(&self, item_id: Uuid, price: Decimal) {
        use orderflow_api::entities::CatalogItem;
        use sea_orm::EntityTrait;

        let item = CatalogItem::find_by_id(item_id)
            .one(&*self.state.db)
            .await
            .expect("Failed to load catalog item")
            .expect("Catalog item missing");
        let mut active: catalog_item::ActiveModel = item.into();
        active.price = Set(price);
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.state.db)
            .await
            .expect("Failed to update catalog price");
    }

    pub async fn seed_offer(&self, kind: OfferKind, value: Decimal, item_ids: &[Uuid]) -> Uuid {
        let offer_id = Uuid::new_v4();
        let now = Utc::now();
        offer::ActiveModel {
            id: Set(offer_id),
            name: Set("Test offer".to_string()),
            kind: Set(kind),
            value: Set(value),
            starts_at: Set(now - chrono::Duration::days(1)),
            ends_at: Set(now + chrono::Duration::days(30)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("Failed to seed offer");

        for item_id in item_ids {
            offer_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                offer_id: Set(offer_id),
                item_id: Set(*item_id),
            }
            .insert(&*self.state.db)
            .await
            .expect("Failed to seed offer item");
        }
        offer_id
    }

    pub async fn seed_expired_offer(&self, kind: OfferKind, value: Decimal, item_ids: &[Uuid]) -> Uuid {
        let offer_id = self.seed_offer(kind, value, item_ids).await;

        use orderflow_api::entities::Offer;
        use sea_orm::EntityTrait;
        let row = Offer::find_by_id(offer_id)
            .one(&*self.state.db)
            .await
            .expect("Failed to load offer")
            .expect("Offer missing");
        let mut active: offer::ActiveModel = row.into();
        active.ends_at = Set(Utc::now() - chrono::Duration::hours(1));
        active
            .update(&*self.state.db)
            .await
            .expect("Failed to expire offer");
        offer_id
    }

    pub async fn seed_promo(
        &self,
        code: &str,
        discount: Decimal,
        max_members: Option<i32>,
    ) -> Uuid {
        let promo_id = Uuid::new_v4();
        let now = Utc::now();
        promo_code::ActiveModel {
            id: Set(promo_id),
            code: Set(code.to_string()),
            discount_amount: Set(discount),
            starts_at: Set(now - chrono::Duration::days(1)),
            ends_at: Set(now + chrono::Duration::days(30)),
            max_members: Set(max_members),
            usage_count: Set(0),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("Failed to seed promo code");
        promo_id
    }

    pub async fn seed_balance(&self, customer_id: Uuid, balance: Decimal) {
        customer_balance::ActiveModel {
            customer_id: Set(customer_id),
            balance: Set(balance),
            updated_at: Set(Utc::now()),
            version: Set(1),
        }
        .insert(&*self.state.db)
        .await
        .expect("Failed to seed balance");
    }

    pub async fn balance_of(&self, customer_id: Uuid) -> Decimal {
        use orderflow_api::entities::CustomerBalance;
        use sea_orm::EntityTrait;

        CustomerBalance::find_by_id(customer_id)
            .one(&*self.state.db)
            .await
            .expect("Failed to load balance")
            .map(|row| row.balance)
            .unwrap_or(Decimal::ZERO)
    }
}
