use crate::cache::{CacheService, SEARCH_PREFIX, SEARCH_TTL_SECONDS};
use crate::models::Event;
use crate::store::StoreResult;
use redis::AsyncCommands;
use tracing::warn;

pub fn search_key(keyword: &str) -> String {
    format!("{}{}", SEARCH_PREFIX, keyword.to_lowercase())
}

impl CacheService {
    /// Поиск событий по названию с кешированием результата.
    pub async fn search_events(&self, keyword: &str) -> StoreResult<Vec<Event>> {
        let key = search_key(keyword);

        if let Ok(Some(cached)) = self.get_cached_search(&key).await {
            if let Ok(events) = serde_json::from_str::<Vec<Event>>(&cached) {
                return Ok(events);
            }
        }

        let events = self.store.search_events(keyword).await?;
        if let Ok(data) = serde_json::to_string(&events) {
            if let Err(e) = self.cache_search_result(&key, &data, SEARCH_TTL_SECONDS).await {
                warn!(error = %e, "Failed to cache search result");
            }
        }
        Ok(events)
    }

    /// Получает закешированный результат поиска по ключу.
    pub async fn get_cached_search(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let Some(redis) = &self.redis else { return Ok(None) };
        let mut conn = redis.conn.clone();
        conn.get(key).await
    }

    /// Сохраняет результат поиска в кеш с указанным TTL (в секундах).
    pub async fn cache_search_result(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), redis::RedisError> {
        let Some(redis) = &self.redis else { return Ok(()) };
        let mut conn = redis.conn.clone();
        conn.set_ex(key, value, ttl_seconds).await
    }
}
