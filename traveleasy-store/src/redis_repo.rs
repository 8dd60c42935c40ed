use async_trait::async_trait;
use tracing::{info, warn};

use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct RedisRateLimiter {
    client: redis::Client,
}

impl RedisRateLimiter {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        // Fail at startup rather than on the first login.
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Connected to Redis for rate limiting");
        Ok(Self { client })
    }

    async fn incr_window(&self, key: &str, window_seconds: i64) -> redis::RedisResult<i64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str, limit: i64, window_seconds: i64) -> bool {
        match self.incr_window(&format!("ratelimit:{}", key), window_seconds).await {
            Ok(count) => count <= limit,
            Err(e) => {
                // Fail open: an unavailable Redis must not lock users out.
                warn!("Rate limiter unavailable, allowing request: {}", e);
                true
            }
        }
    }
}
