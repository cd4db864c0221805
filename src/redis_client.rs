use redis::{aio::MultiplexedConnection, Client};
use tracing::info;

#[derive(Clone)]
pub struct RedisClient {
    pub conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        info!("Redis connected");
        Ok(RedisClient { conn })
    }

    /// Необязательное подключение: без URL кеш и OTP работают без Redis.
    pub async fn connect_optional(redis_url: Option<&str>) -> redis::RedisResult<Option<Self>> {
        match redis_url {
            Some(url) => Ok(Some(Self::new(url).await?)),
            None => {
                info!("REDIS_URL not set, running without Redis");
                Ok(None)
            }
        }
    }
}
