//! Cart pricing and order lifecycle engine.
//!
//! Converts a mutable shopping cart into an immutable order and drives the
//! order through a multi-branch status state machine, coordinating stacked
//! offers, promo codes, OTP-gated confirmation, idempotent split payments
//! and an append-only audit history. Transport layers (HTTP/gRPC), auth and
//! delivery mechanics live outside this crate and consume [`AppState`].

pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod notifications;
pub mod services;

use std::sync::Arc;

use crate::{
    cache::{CacheBackend, InMemoryCache},
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        CartService, CheckoutService, OrderLifecycleService, OtpService, PaymentService,
        PromoService,
    },
};

/// Constructed service set, one instance of each engine service sharing the
/// same pool and event sender.
#[derive(Clone)]
pub struct AppServices {
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderLifecycleService,
    pub payments: PaymentService,
    pub promos: PromoService,
    pub otp: OtpService,
}

/// Shared application state handed to embedders and tests.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub event_sender: Arc<EventSender>,
    pub cache: Arc<dyn CacheBackend>,
    pub services: AppServices,
}

impl AppState {
    /// Wires the service graph on top of an established pool.
    pub fn new(db: Arc<DbPool>, config: Arc<AppConfig>, event_sender: Arc<EventSender>) -> Self {
        let cache: Arc<dyn CacheBackend> = Arc::new(InMemoryCache::new());
        Self::with_cache(db, config, event_sender, cache)
    }

    pub fn with_cache(
        db: Arc<DbPool>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        cache: Arc<dyn CacheBackend>,
    ) -> Self {
        let services = AppServices {
            cart: CartService::new(db.clone(), event_sender.clone(), config.currency.clone()),
            checkout: CheckoutService::new(db.clone(), event_sender.clone()),
            orders: OrderLifecycleService::new(db.clone(), event_sender.clone()),
            payments: PaymentService::new(db.clone(), event_sender.clone()),
            promos: PromoService::new(db.clone(), event_sender.clone(), cache.clone()),
            otp: OtpService::new(
                db.clone(),
                event_sender.clone(),
                config.otp_ttl(),
                config.otp_code_length,
            ),
        };
        Self {
            db,
            config,
            event_sender,
            cache,
            services,
        }
    }
}
