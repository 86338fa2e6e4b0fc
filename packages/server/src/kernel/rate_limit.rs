//! In-process fixed-window rate limiter.
//!
//! Counters live in a `Mutex<HashMap>`; the read-modify-write happens under
//! the lock so two concurrent requests cannot both observe "under limit".
//! Windows are fixed, not sliding. Process-local only: counters reset on
//! restart and are not shared between instances.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::traits::{BaseRateLimiter, RateLimitDecision};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Fixed-window counter keyed by caller-chosen strings, typically
/// `"{action}:{client_ip}"`.
pub struct FixedWindowRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowRateLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Window evaluation against an explicit `now`, so the policy is
    /// deterministic under test. The trait method feeds in wall-clock time.
    pub fn check_and_consume_at(
        &self,
        key: &str,
        max: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let window_len = ChronoDuration::from_std(window)
            .unwrap_or_else(|_| ChronoDuration::seconds(60));

        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        let entry = windows.get(key).copied();
        let state = match entry {
            Some(state) if now < state.reset_at => Window {
                count: state.count + 1,
                reset_at: state.reset_at,
            },
            // Missing entry or expired window: start a fresh one.
            _ => Window {
                count: 1,
                reset_at: now + window_len,
            },
        };
        windows.insert(key.to_string(), state);

        RateLimitDecision {
            allowed: state.count <= max,
            remaining: max.saturating_sub(state.count),
            reset_at: state.reset_at,
        }
    }

    /// Drop expired windows. The periodic cleanup sweep calls this; nothing
    /// in the request path depends on it.
    pub fn evict_expired(&self, now: DateTime<Utc>) {
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");
        windows.retain(|_, w| now < w.reset_at);
    }
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRateLimiter for FixedWindowRateLimiter {
    async fn check_and_consume(
        &self,
        key: &str,
        max: u32,
        window: Duration,
    ) -> RateLimitDecision {
        self.check_and_consume_at(key, max, window, Utc::now())
    }
}
