//! Leaky-bucket rate limiter gating every attempt sent to the endpoint.
//!
//! The bucket holds up to `max_rate` permits and drains continuously at
//! `max_rate / period`. An idle limiter therefore admits a burst of
//! `max_rate` acquisitions, after which callers are spaced evenly.
//!
//! Waiters queue on a fair async mutex that stays held while the current
//! waiter sleeps, so permits are handed out in arrival order.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug)]
struct Bucket {
    level: f64,
    last_drain: Instant,
}

impl Bucket {
    fn drain(&mut self, now: Instant, rate_per_sec: f64) {
        let elapsed = now.saturating_duration_since(self.last_drain).as_secs_f64();
        self.level = (self.level - elapsed * rate_per_sec).max(0.0);
        self.last_drain = now;
    }
}

/// Async rate limiter. Acquisition never fails, it only delays.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    rate_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Admit at most `max_rate` permits per `period`. A zero rate is treated as one.
    pub fn new(max_rate: u32, period: Duration) -> Self {
        let capacity = f64::from(max_rate.max(1));
        let period_secs = period.as_secs_f64().max(f64::EPSILON);
        Self {
            capacity,
            rate_per_sec: capacity / period_secs,
            bucket: Mutex::new(Bucket {
                level: 0.0,
                last_drain: Instant::now(),
            }),
        }
    }

    pub fn per_second(max_rate: u32) -> Self {
        Self::new(max_rate, Duration::from_secs(1))
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Wait until a permit is available and consume it.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;
        loop {
            bucket.drain(Instant::now(), self.rate_per_sec);
            if bucket.level + 1.0 <= self.capacity {
                bucket.level += 1.0;
                return;
            }

            let wait_secs = (bucket.level + 1.0 - self.capacity) / self.rate_per_sec;
            let wait = Duration::from_secs_f64(wait_secs);
            trace!(wait_ms = wait.as_millis() as u64, "rate limiter waiting");
            tokio::time::sleep(wait).await;
        }
    }
}
