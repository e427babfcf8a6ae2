//! TokenBucket (C2). Spec.md §4.2.
//!
//! A simple O(1), thread-safe token bucket: capacity `burst`, refill rate
//! `rate/sec`, lazily topped up on each `try_consume` call rather than by a
//! background task — same approach `governor`'s `GCRA` algorithm takes, but
//! hand-rolled here since the dedup-window semantics (spec.md §4.3) need the
//! same "lazily advance on touch" idiom and keeping both in one small module
//! avoids pulling `governor` in for something this small. `governor` is
//! still used for the coarser API-client QPS cap in `aggregator-k8s`
//! (SPEC_FULL.md §2), where its `GCRA` keyed-limiter fits better.

use std::sync::Mutex;
use std::time::Instant;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Per-source rate limiter. Defaults: 100 rps, 200 burst (spec.md §4.2).
pub struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        TokenBucket {
            capacity: burst,
            rate_per_sec,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn default_bucket() -> Self {
        TokenBucket::new(100.0, 200.0)
    }

    /// Attempt to consume one token. O(1), never blocks.
    pub fn try_consume(&self, now: Instant) -> bool {
        self.try_consume_n(now, 1.0)
    }

    pub fn try_consume_n(&self, now: Instant, n: f64) -> bool {
        let mut state = self.state.lock().unwrap();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= n {
            state.tokens -= n;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn admits_up_to_burst_then_denies() {
        let bucket = TokenBucket::new(0.0, 3.0);
        let now = Instant::now();
        assert!(bucket.try_consume(now));
        assert!(bucket.try_consume(now));
        assert!(bucket.try_consume(now));
        assert!(!bucket.try_consume(now));
    }

    #[test]
    fn refills_over_time() {
        let bucket = TokenBucket::new(10.0, 1.0);
        let t0 = Instant::now();
        assert!(bucket.try_consume(t0));
        assert!(!bucket.try_consume(t0));
        let t1 = t0 + Duration::from_millis(200); // 2 tokens at 10/s
        assert!(bucket.try_consume(t1));
    }

    #[test]
    fn default_matches_spec() {
        let bucket = TokenBucket::default_bucket();
        let now = Instant::now();
        for _ in 0..200 {
            assert!(bucket.try_consume(now));
        }
        assert!(!bucket.try_consume(now));
    }

    #[test]
    fn drop_early_under_overload() {
        // 1000 unique requests at t0 with default 100rps/200burst: ~200 admitted.
        let bucket = TokenBucket::default_bucket();
        let now = Instant::now();
        let admitted = (0..1000).filter(|_| bucket.try_consume(now)).count();
        assert_eq!(admitted, 200);
    }
}
