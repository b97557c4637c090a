use super::{Middleware, Next};
use crate::context::Context;

use http::header::{HeaderValue, RETRY_AFTER};
use http::StatusCode;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

// Buckets idle for longer than this many refill periods are dropped.
const IDLE_PERIODS: u32 = 4;
const PRUNE_THRESHOLD: usize = 4096;

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// A token bucket per client key. Requests over the limit are answered with
/// `429 Too Many Requests` and never reach the inner chain.
///
/// ```
/// use arbor::middleware::RateLimit;
/// use std::time::Duration;
///
/// // ten requests per second per remote address, as reported by a proxy
/// let limit = RateLimit::new(10, Duration::from_secs(1), |ctx: &arbor::Context| {
///     ctx.header("x-forwarded-for").unwrap_or("unknown").to_owned()
/// });
/// ```
pub struct RateLimit<K> {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    capacity: f64,
    period: Duration,
    key: K,
}

impl<K> RateLimit<K>
where
    K: Fn(&Context) -> String + Send + Sync + 'static,
{
    /// Allows bursts of `capacity` requests, refilled evenly over `period`.
    pub fn new(capacity: u32, period: Duration, key: K) -> Self {
        RateLimit {
            buckets: Mutex::new(HashMap::new()),
            capacity: f64::from(capacity.max(1)),
            period,
            key,
        }
    }

    fn allow(&self, key: String, now: Instant) -> bool {
        let refill_per_sec = self.capacity / self.period.as_secs_f64().max(f64::EPSILON);
        let mut buckets = self.buckets.lock();

        if buckets.len() >= PRUNE_THRESHOLD {
            let idle = self.period * IDLE_PERIODS;
            buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < idle);
        }

        buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(self.capacity, now))
            .try_acquire(self.capacity, refill_per_sec, now)
    }
}

impl<K> Middleware for RateLimit<K>
where
    K: Fn(&Context) -> String + Send + Sync + 'static,
{
    fn call(&self, ctx: &mut Context, next: Next<'_>) {
        let key = (self.key)(ctx);
        if self.allow(key.clone(), Instant::now()) {
            return next.run(ctx);
        }

        warn!("rate limit exceeded for '{}' on {} {}", key, ctx.method(), ctx.path());
        ctx.text(StatusCode::TOO_MANY_REQUESTS, "429 Too Many Requests");
        let retry = self.period.as_secs().max(1).to_string();
        if let Ok(value) = HeaderValue::from_str(&retry) {
            ctx.set_header(RETRY_AFTER, value);
        }
    }
}
