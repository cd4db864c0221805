use std::sync::Arc;
use tracing::{info, warn};

use crate::{redis_client::RedisClient, store::Store};

pub mod events;
pub mod search;

pub const EVENTS_KEY: &str = "events:all";
pub const EVENTS_TTL_SECONDS: u64 = 3600;
pub const SEARCH_PREFIX: &str = "search:events:";
pub const SEARCH_TTL_SECONDS: u64 = 300;

/// Read-through кеш поверх хранилища. Если Redis не настроен или
/// недоступен, все запросы идут напрямую в хранилище.
#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    store: Arc<dyn Store>,
}

impl CacheService {
    pub fn new(redis: Option<RedisClient>, store: Arc<dyn Store>) -> Self {
        Self { redis, store }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }

    // Прогрев кеша при старте
    pub async fn warmup_cache(&self) {
        if !self.is_enabled() {
            return;
        }
        info!("Starting cache warmup...");
        match self.get_events().await {
            Ok(events) => info!(count = events.len(), "Cache warmup done"),
            Err(e) => warn!(error = %e, "Cache warmup failed"),
        }
    }
}
