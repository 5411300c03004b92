// Request pacing for the language model API.
//
// Chat and embedding endpoints throttle bursts, and the batch pipeline can
// fire many requests at once. Every call waits for its slot: requests are
// spaced at least `1 / qps` seconds apart across all tasks sharing the
// limiter.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Shared minimum-interval limiter. Clones share the same schedule.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<Schedule>>,
}

struct Schedule {
    interval: Duration,
    /// Earliest instant the next request may start
    next_slot: Option<Instant>,
}

impl RateLimiter {
    /// Allow at most `requests_per_second` requests per second.
    pub fn new(requests_per_second: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Schedule {
                interval: Duration::from_secs_f64(1.0 / requests_per_second),
                next_slot: None,
            })),
        }
    }

    /// Wait for this caller's slot.
    ///
    /// The slot is reserved under the lock and the sleep happens after the
    /// lock is released, so concurrent callers queue up one interval apart.
    pub async fn acquire(&self) {
        let wait_until = {
            let mut schedule = self.inner.lock().await;
            let now = Instant::now();
            let slot = match schedule.next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            schedule.next_slot = Some(slot + schedule.interval);
            slot
        };

        if wait_until > Instant::now() {
            tokio::time::sleep_until(wait_until).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_second_request_waits_one_interval() {
        let limiter = RateLimiter::new(2.0); // 500ms between requests
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(400),
            "Expected ~500ms delay, got {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_clones_share_the_schedule() {
        let limiter = RateLimiter::new(4.0); // 250ms between requests
        let other = limiter.clone();
        limiter.acquire().await;
        let start = Instant::now();
        other.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
