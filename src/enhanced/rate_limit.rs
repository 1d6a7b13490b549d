//! Rate Limiting
//!
//! Sliding-window admission control per normalized key.
//!
//! Each key keeps an ordered queue of accepted request times. A check drops
//! the times that fell out of the window, admits the request if fewer than
//! `quota` remain, and records the new time only when it admits.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use tokio_emotion_orchestrator::enhanced::RateLimiter;
//! use tokio_emotion_orchestrator::normalize;
//!
//! let limiter = RateLimiter::new(15, Duration::from_secs(60));
//! let key = normalize("some text");
//! if limiter.allow(&key) {
//!     // consult a provider
//! } else {
//!     // serve stale cache or the degraded default
//! }
//! ```

use crate::NormalizedKey;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-key sliding-window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<NormalizedKey, VecDeque<Instant>>>,
    quota: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter admitting `quota` requests per key per `window`.
    pub fn new(quota: usize, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            quota,
            window,
        }
    }

    /// Check if a request for `key` is allowed, recording it if so.
    ///
    /// Returns `true` if allowed, `false` if the quota is exhausted.
    pub fn allow(&self, key: &NormalizedKey) -> bool {
        let now = Instant::now();
        let mut timestamps = self.windows.entry(key.clone()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.quota {
            warn!(
                key = %key,
                count = timestamps.len(),
                limit = self.quota,
                "rate limit exceeded"
            );
            return false;
        }

        timestamps.push_back(now);
        debug!(
            key = %key,
            count = timestamps.len(),
            limit = self.quota,
            "rate limit check passed"
        );
        true
    }

    /// Forget all recorded requests for `key`.
    pub fn reset(&self, key: &NormalizedKey) {
        self.windows.remove(key);
        debug!(key = %key, "rate limit reset");
    }

    /// Drop windows with no request inside the window. Returns how many
    /// windows were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let window = self.window;
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < window);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Current usage for `key`, or `None` if the key has no window.
    pub fn usage(&self, key: &NormalizedKey) -> Option<RateLimitInfo> {
        let now = Instant::now();
        self.windows.get(key).map(|timestamps| {
            let live: Vec<&Instant> = timestamps
                .iter()
                .filter(|t| now.duration_since(**t) < self.window)
                .collect();
            let reset_in = live
                .first()
                .map(|oldest| self.window.saturating_sub(now.duration_since(**oldest)))
                .unwrap_or_default();
            RateLimitInfo {
                used: live.len(),
                remaining: self.quota.saturating_sub(live.len()),
                reset_in,
            }
        })
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Rate limit information for a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Requests admitted inside the current window.
    pub used: usize,
    /// Requests still available inside the current window.
    pub remaining: usize,
    /// Time until the oldest admitted request leaves the window.
    pub reset_in: Duration,
}
