//! Minimum spacing between provider calls across concurrent sessions.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Releases at most one provider call per interval, shared by every caller.
#[derive(Clone)]
pub struct CallPacer {
    limiter: Option<Arc<DirectLimiter>>,
    interval: Duration,
}

impl CallPacer {
    /// A zero interval disables pacing.
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval).map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter, interval }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Wait for the next call slot.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_zero_interval_disables_pacing() {
        let pacer = CallPacer::from_millis(0);
        assert!(!pacer.is_enabled());
        pacer.wait().await;
    }

    #[tokio::test]
    async fn test_calls_are_spaced() {
        let pacer = CallPacer::from_millis(40);
        let shared = pacer.clone();

        let start = Instant::now();
        pacer.wait().await;
        shared.wait().await;
        pacer.wait().await;
        // Clones share one limiter: the first slot is immediate, the next two wait.
        assert!(start.elapsed() >= Duration::from_millis(70));
    }
}
