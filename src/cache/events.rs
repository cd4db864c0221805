use crate::cache::{CacheService, EVENTS_KEY, EVENTS_TTL_SECONDS, SEARCH_PREFIX};
use crate::models::Event;
use crate::store::StoreResult;
use redis::AsyncCommands;
use tracing::{debug, warn};

impl CacheService {
    // Получить события
    pub async fn get_events(&self) -> StoreResult<Vec<Event>> {
        // Сначала пробуем кеш
        if let Some(events) = self.get_events_from_cache().await {
            return Ok(events);
        }

        // Промах - идем в хранилище
        let events = self.store.list_events().await?;
        if let Err(e) = self.save_events_to_cache(&events).await {
            warn!(error = %e, "Failed to cache events");
        }
        Ok(events)
    }

    /// Сбрасывает список событий и все результаты поиска.
    /// Вызывается после любой записи в события.
    pub async fn invalidate_events(&self) {
        let Some(redis) = &self.redis else { return };
        let mut conn = redis.conn.clone();

        let result: Result<(), redis::RedisError> = async {
            let mut keys: Vec<String> = redis::cmd("KEYS")
                .arg(format!("{}*", SEARCH_PREFIX))
                .query_async(&mut conn)
                .await?;
            keys.push(EVENTS_KEY.to_string());
            let _: () = conn.del(keys).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => debug!("Event cache invalidated"),
            Err(e) => warn!(error = %e, "Failed to invalidate event cache"),
        }
    }

    // === Работа с кешем ===
    async fn get_events_from_cache(&self) -> Option<Vec<Event>> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let data: Option<String> = match conn.get(EVENTS_KEY).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Redis read failed");
                return None;
            }
        };
        serde_json::from_str(&data?).ok()
    }

    async fn save_events_to_cache(&self, events: &[Event]) -> Result<(), redis::RedisError> {
        let Some(redis) = &self.redis else { return Ok(()) };
        let data = serde_json::to_string(events).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = redis.conn.clone();
        conn.set_ex(EVENTS_KEY, data, EVENTS_TTL_SECONDS).await
    }
}
