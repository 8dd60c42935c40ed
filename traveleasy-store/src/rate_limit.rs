use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Fixed-window attempt counter keyed by an arbitrary string.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records one attempt; `false` once `limit` attempts fall in the current window.
    async fn check(&self, key: &str, limit: i64, window_seconds: i64) -> bool;
}

#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, (Instant, i64)>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(&self, key: &str, limit: i64, window_seconds: i64) -> bool {
        let window = Duration::from_secs(window_seconds.max(0) as u64);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        windows.retain(|_, (started, _)| now.duration_since(*started) < window);
        let entry = windows.entry(key.to_string()).or_insert((now, 0));
        entry.1 += 1;
        entry.1 <= limit
    }
}
