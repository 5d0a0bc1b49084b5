//! Read-mostly caching for the promo/offer catalog.
//!
//! The engine only ever *invalidates*: every usage-count mutation deletes the
//! promo-listing key so the next read repopulates. Backed by an in-memory
//! store; a distributed backend can be swapped in behind [`CacheBackend`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Cache key for the public promo-code listing.
pub const PROMO_LISTING_KEY: &str = "promo_codes:listing";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// In-memory cache backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_locked(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_locked(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let expired = match self.read_locked().get(key) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => return Ok(Some(entry.value.clone())),
            None => return Ok(None),
        };
        if expired {
            self.write_locked().remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.write_locked()
            .insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.write_locked().remove(key);
        Ok(())
    }
}
