//! A per-worker token bucket: 10 tokens/sec, burst 1. With a burst of one token the bucket
//! degenerates to "at least 100ms between successive permits", so a plain ticking interval
//! implements it exactly without pulling in a governor-style crate for one gate.
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

const TOKENS_PER_SECOND: u64 = 10;

pub struct RateLimiter {
    interval: Interval,
}

impl RateLimiter {
    pub fn new() -> Self {
        let mut interval = interval(Duration::from_millis(1000 / TOKENS_PER_SECOND));
        // A worker that fell behind (e.g. a slow accrual call) should not burst through a
        // backlog of missed ticks; it should simply resume pacing from now.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Suspends until a token is available. This is the only suspension point in the worker
    /// loop besides I/O.
    pub async fn acquire(&mut self) {
        self.interval.tick().await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
