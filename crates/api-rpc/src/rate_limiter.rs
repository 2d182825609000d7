//! Rate Limiter (Token Bucket Algorithm)
//!
//! Prevents DoS attacks by limiting tool calls per second.

use std::sync::Mutex;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter. One bucket per server, refilled lazily on
/// every check.
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_tokens` - Maximum burst size
    /// * `refill_rate` - Tokens added per second
    ///
    /// # Example
    /// Allow 100 requests/sec with burst of 200:
    /// `RateLimiter::new(200, 100)`
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: max_tokens as f64,
                last_refill: Instant::now(),
            }),
            max_tokens,
            refill_rate,
        }
    }

    /// Check if a request is allowed (consumes 1 token)
    ///
    /// Returns true if allowed, false if rate limited
    pub async fn check(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap();
        let now = Instant::now();

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens =
            (bucket.tokens + elapsed * self.refill_rate as f64).min(self.max_tokens as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Get remaining tokens (for monitoring)
    #[allow(dead_code)]
    pub async fn remaining(&self) -> f64 {
        self.bucket.lock().unwrap().tokens
    }
}
