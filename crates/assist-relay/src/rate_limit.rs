//! Per-client sliding-window rate limiter for session creation.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Tracks request stamps per client id over a rolling window. Only session
/// creation is limited; join is deliberately unthrottled.
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request for `key` and report whether it is allowed.
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;

        let stamps = hits.entry(key.to_string()).or_default();
        while let Some(front) = stamps.front() {
            if now.duration_since(*front) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }

        if stamps.len() >= self.max_requests {
            tracing::warn!(client = %key, "create rate limit hit");
            return false;
        }
        stamps.push_back(now);
        true
    }

    /// Drop clients whose window has fully drained. Called from the sweep
    /// task to bound the map's growth.
    pub async fn prune(&self) {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        hits.retain(|_, stamps| {
            stamps
                .back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_limit() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 5);
        for _ in 0..5 {
            assert!(limiter.check("client-a").await);
        }
        assert!(!limiter.check("client-a").await);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.check("client-a").await);
        assert!(!limiter.check("client-a").await);
        assert!(limiter.check("client-b").await);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        assert!(limiter.check("client-a").await);
        assert!(limiter.check("client-a").await);
        assert!(!limiter.check("client-a").await);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("client-a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_drained_clients() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 5);
        assert!(limiter.check("client-a").await);

        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.prune().await;
        assert!(limiter.hits.lock().await.is_empty());
    }
}
