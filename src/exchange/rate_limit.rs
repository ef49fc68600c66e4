// =============================================================================
// Token-bucket rate limiter — gates all outgoing Exchange Client calls
// =============================================================================
//
// Bithumb allows 20 requests / 60 seconds per API key. Unlike the
// donor's header-driven weight tracker, there's no response header carrying
// remaining budget, so this refills a simple token bucket on a timer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: u32 = 20;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    capacity: u32,
    window: Duration,
    tokens: AtomicU32,
    window_start: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            tokens: AtomicU32::new(capacity),
            window_start: Mutex::new(Instant::now()),
        }
    }

    fn maybe_refill(&self) {
        let mut start = self.window_start.lock();
        if start.elapsed() >= self.window {
            self.tokens.store(self.capacity, Ordering::SeqCst);
            *start = Instant::now();
            debug!(capacity = self.capacity, "rate limit window refilled");
        }
    }

    /// Block (async) until a token is available, then consume it. Waits in
    /// `window`-sized increments, capped at `deadline`, returning `false` if
    /// the deadline elapses first.
    pub async fn acquire(&self, deadline: Duration) -> bool {
        let start = Instant::now();
        loop {
            self.maybe_refill();
            let current = self.tokens.load(Ordering::SeqCst);
            if current > 0
                && self
                    .tokens
                    .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                return true;
            }
            if start.elapsed() >= deadline {
                warn!("rate limiter deadline exceeded while waiting for a token");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn available(&self) -> u32 {
        self.maybe_refill();
        self.tokens.load(Ordering::SeqCst)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_drains_then_refills() {
        let limiter = RateLimiter::new(2, Duration::from_millis(200));
        assert!(limiter.acquire(Duration::from_millis(10)).await);
        assert!(limiter.acquire(Duration::from_millis(10)).await);
        assert!(!limiter.acquire(Duration::from_millis(10)).await);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter.acquire(Duration::from_millis(10)).await);
    }

    #[test]
    fn available_reports_remaining_capacity() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        assert_eq!(limiter.available(), 5);
    }
}
