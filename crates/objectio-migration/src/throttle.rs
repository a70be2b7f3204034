//! Token-bucket bandwidth throttle shared by every migration worker.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Bounds the migration's aggregate read+write bandwidth. Tokens refill
/// at `rate` bytes/s up to `burst` capacity; `acquire` blocks until
/// enough tokens are available. Rate and enable/disable may change at
/// runtime.
pub struct TokenBucket {
    bucket: Mutex<Bucket>,
    rate_bps: AtomicU64,
    burst_bytes: AtomicU64,
    enabled: AtomicBool,
}

impl TokenBucket {
    #[must_use]
    pub fn new(rate_bps: u64, burst_bytes: u64) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: burst_bytes as f64,
                last_refill: Instant::now(),
            }),
            rate_bps: AtomicU64::new(rate_bps),
            burst_bytes: AtomicU64::new(burst_bytes),
            enabled: AtomicBool::new(rate_bps > 0),
        }
    }

    pub fn set_rate(&self, rate_bps: u64) {
        self.rate_bps.store(rate_bps, Ordering::Relaxed);
        self.enabled.store(rate_bps > 0, Ordering::Relaxed);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Block (via short sleeps) until `n_bytes` worth of tokens are
    /// available, then consume them. A no-op when disabled.
    pub fn acquire(&self, n_bytes: u64) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let rate = self.rate_bps.load(Ordering::Relaxed) as f64;
        let burst = self.burst_bytes.load(Ordering::Relaxed) as f64;
        if rate <= 0.0 {
            return;
        }

        loop {
            let mut guard = self.bucket.lock();
            let elapsed = guard.last_refill.elapsed().as_secs_f64();
            guard.tokens = (guard.tokens + elapsed * rate).min(burst);
            guard.last_refill = Instant::now();

            if guard.tokens >= n_bytes as f64 {
                guard.tokens -= n_bytes as f64;
                return;
            }
            let deficit = n_bytes as f64 - guard.tokens;
            drop(guard);
            std::thread::sleep(Duration::from_secs_f64((deficit / rate).min(1.0)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_blocks() {
        let bucket = TokenBucket::new(0, 1024);
        bucket.acquire(1_000_000_000);
    }

    #[test]
    fn test_acquire_within_burst_is_immediate() {
        let bucket = TokenBucket::new(1_000_000, 1_000_000);
        let start = Instant::now();
        bucket.acquire(1000);
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
