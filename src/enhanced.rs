//! Resilience primitives
//!
//! Result caching, per-key rate limiting, primary-provider health tracking
//! and in-flight request coalescing. Every operation here is in-memory and
//! non-suspending, except awaiting a shared in-flight result.

pub mod cache;
pub mod health;
pub mod inflight;
pub mod rate_limit;

// Re-exports
pub use cache::{CacheStats, ResultCache};
pub use health::{HealthAttempt, HealthState, HealthStats, HealthTracker};
pub use inflight::{InFlightClaim, InFlightRegistry, InFlightRole};
pub use rate_limit::{RateLimitInfo, RateLimiter};
