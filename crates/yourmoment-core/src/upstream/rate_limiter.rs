//! Process-wide rate limiter shared by every upstream HTTP call.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Guarantees successive acquisitions are separated by at least
/// `1 / requests_per_second` seconds, regardless of how many concurrent
/// callers are waiting.
pub struct RateLimiter {
    min_interval: Duration,
    last_request_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Build a rate limiter from a requests-per-second budget.
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / requests_per_second)
        };
        Self {
            min_interval,
            last_request_at: Mutex::new(None),
        }
    }

    /// Block until it is this caller's turn, then record the request time.
    pub async fn acquire(&self) {
        let mut last = self.last_request_at.lock().await;
        let now = Instant::now();

        if let Some(previous) = *last {
            let elapsed = now.duration_since(previous);
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn serializes_calls_with_minimum_interval() {
        let limiter = Arc::new(RateLimiter::new(10.0)); // 100ms interval
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn concurrent_acquisitions_are_still_serialized() {
        let limiter = Arc::new(RateLimiter::new(20.0)); // 50ms interval
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(140));
    }

    #[tokio::test]
    async fn zero_rate_never_blocks() {
        let limiter = RateLimiter::new(0.0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
