//! Health Tracker
//!
//! Circuit breaker for the primary provider.
//!
//! ## States
//! - **Healthy**: the primary is called on every request
//! - **Unhealthy**: the primary is skipped until the cooldown elapses; the
//!   first request after that is the probe
//!
//! There is no dedicated heartbeat: the probe is a real classification call,
//! so recovery is only noticed when some caller arrives after the cooldown.
//!
//! ## Attempts
//! [`HealthTracker::should_attempt`] hands out a [`HealthAttempt`] tagged
//! with the tracker's generation, and outcomes are reported against it. The
//! generation advances on every trip and every admitted probe, so a call
//! that started before the breaker opened cannot close it by finishing late.
//! Only the admitted probe moves Unhealthy to Healthy.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use tokio_emotion_orchestrator::enhanced::HealthTracker;
//!
//! let health = HealthTracker::new(Duration::from_secs(120));
//! if let Some(attempt) = health.should_attempt() {
//!     // call the primary, then:
//!     health.record_success(attempt);
//! }
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Health of the primary provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Requests flow to the primary.
    Healthy,
    /// The primary failed recently and is skipped until the cooldown elapses.
    Unhealthy,
}

/// Permission to call the primary once, returned by
/// [`HealthTracker::should_attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthAttempt {
    generation: u64,
    probe: bool,
}

impl HealthAttempt {
    /// Whether this attempt is the recovery probe after a cooldown.
    pub fn is_probe(&self) -> bool {
        self.probe
    }
}

#[derive(Debug)]
struct TrackerState {
    status: HealthState,
    generation: u64,
    last_checked_at: Option<Instant>,
    last_state_change: Instant,
    failures: u64,
    successes: u64,
    probes: u64,
}

impl TrackerState {
    fn open(&mut self) {
        self.status = HealthState::Unhealthy;
        self.generation += 1;
        self.last_checked_at = Some(Instant::now());
        self.last_state_change = Instant::now();
    }
}

/// Process-wide circuit breaker state for the primary provider.
#[derive(Clone)]
pub struct HealthTracker {
    state: Arc<Mutex<TrackerState>>,
    cooldown: Duration,
}

impl HealthTracker {
    /// Create a tracker that starts healthy.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState {
                status: HealthState::Healthy,
                generation: 0,
                last_checked_at: None,
                last_state_change: Instant::now(),
                failures: 0,
                successes: 0,
                probes: 0,
            })),
            cooldown,
        }
    }

    /// Admit a primary call for this request, or `None` to skip the primary.
    ///
    /// While unhealthy, at most one probe is admitted per cooldown: admitting
    /// a probe restarts the cooldown clock, so concurrent requests arriving
    /// at the same moment keep skipping the primary.
    pub fn should_attempt(&self) -> Option<HealthAttempt> {
        let mut state = self.state.lock();
        match state.status {
            HealthState::Healthy => Some(HealthAttempt {
                generation: state.generation,
                probe: false,
            }),
            HealthState::Unhealthy => {
                let cooled = state
                    .last_checked_at
                    .map(|t| t.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if cooled {
                    state.generation += 1;
                    state.last_checked_at = Some(Instant::now());
                    state.probes += 1;
                    info!("health: cooldown elapsed, probing primary");
                    Some(HealthAttempt {
                        generation: state.generation,
                        probe: true,
                    })
                } else {
                    debug!("health: primary skipped (unhealthy)");
                    None
                }
            }
        }
    }

    /// Record a successful primary call.
    ///
    /// Closes the breaker only for the current probe; a late success from a
    /// call admitted before the breaker opened leaves it open.
    pub fn record_success(&self, attempt: HealthAttempt) {
        let mut state = self.state.lock();
        state.successes += 1;
        if state.status == HealthState::Healthy {
            return;
        }
        if attempt.probe && attempt.generation == state.generation {
            state.status = HealthState::Healthy;
            state.last_checked_at = Some(Instant::now());
            state.last_state_change = Instant::now();
            info!("health: primary recovered");
        } else {
            debug!("health: stale success ignored, primary stays unhealthy");
        }
    }

    /// Record a failed primary call.
    ///
    /// Opens the breaker when healthy. A failed probe restarts the cooldown;
    /// failures from attempts older than the current generation are counted
    /// but change nothing.
    pub fn record_failure(&self, attempt: HealthAttempt) {
        let mut state = self.state.lock();
        state.failures += 1;
        if attempt.generation != state.generation {
            debug!("health: stale failure ignored");
            return;
        }
        match state.status {
            HealthState::Healthy => {
                state.open();
                warn!(
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "health: primary marked unhealthy"
                );
            }
            HealthState::Unhealthy => {
                state.last_checked_at = Some(Instant::now());
                warn!("health: probe failed, primary stays unhealthy");
            }
        }
    }

/// Current state.
    pub fn status(&self) -> HealthState {
        self.state.lock().status
    }

    /// Whether the primary is currently considered healthy.
    pub fn is_healthy(&self) -> bool {
        self.status() == HealthState::Healthy
    }

    /// Health statistics
    pub fn stats(&self) -> HealthStats {
        let state = self.state.lock();
        HealthStats {
            status: state.status,
            failures: state.failures,
            successes: state.successes,
            probes: state.probes,
            time_in_current_state: state.last_state_change.elapsed(),
            cooldown_remaining: match (state.status, state.last_checked_at) {
                (HealthState::Unhealthy, Some(t)) => self.cooldown.saturating_sub(t.elapsed()),
                _ => Duration::ZERO,
            },
        }
    }

    /// Force the healthy state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.status = HealthState::Healthy;
        state.generation += 1;
        state.last_state_change = Instant::now();
        info!("health: manually reset to healthy");
    }

    /// Force the unhealthy state, starting a fresh cooldown.
    pub fn trip(&self) {
        self.state.lock().open();
        warn!("health: manually tripped to unhealthy");
    }
}

/// Health tracker statistics
#[derive(Debug, Clone)]
pub struct HealthStats {
    /// Current state.
    pub status: HealthState,
    /// Failed primary calls since creation.
    pub failures: u64,
    /// Successful primary calls since creation.
    pub successes: u64,
    /// Probes admitted after a cooldown.
    pub probes: u64,
    /// Wall-clock time spent in the current state.
    pub time_in_current_state: Duration,
    /// Time left before the next probe is admitted (zero when healthy).
    pub cooldown_remaining: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admit(health: &HealthTracker) -> HealthAttempt {
        health.should_attempt().expect("test: attempt admitted")
    }

    #[test]
    fn test_starts_healthy_and_attempts() {
        let health = HealthTracker::new(Duration::from_secs(60));
        assert!(health.is_healthy());
        assert!(!admit(&health).is_probe());
        assert!(health.should_attempt().is_some());
    }

    #[test]
    fn test_failure_skips_primary_during_cooldown() {
        let health = HealthTracker::new(Duration::from_secs(60));
        health.record_failure(admit(&health));
        assert_eq!(health.status(), HealthState::Unhealthy);
        for _ in 0..10 {
            assert!(health.should_attempt().is_none());
        }
    }

    #[tokio::test]
    async fn test_trial_call_after_cooldown_recovers() {
        let health = HealthTracker::new(Duration::from_millis(50));
        health.record_failure(admit(&health));
        assert!(health.should_attempt().is_none());

        tokio::time::sleep(Duration::from_millis(70)).await;
        let probe = admit(&health);
        assert!(probe.is_probe(), "probe admitted after cooldown");
        health.record_success(probe);
        assert!(health.is_healthy());
        assert!(health.should_attempt().is_some());
    }

    #[tokio::test]
    async fn test_only_one_trial_call_per_cooldown() {
        let health = HealthTracker::new(Duration::from_millis(50));
        health.record_failure(admit(&health));
        tokio::time::sleep(Duration::from_millis(70)).await;

        assert!(health.should_attempt().is_some());
        assert!(
            health.should_attempt().is_none(),
            "second caller must not probe too"
        );
        assert_eq!(health.stats().probes, 1);
    }

    #[tokio::test]
    async fn test_failed_trial_call_restarts_cooldown() {
        let health = HealthTracker::new(Duration::from_millis(50));
        health.record_failure(admit(&health));
        tokio::time::sleep(Duration::from_millis(70)).await;

        health.record_failure(admit(&health));
        assert_eq!(health.status(), HealthState::Unhealthy);
        assert!(health.should_attempt().is_none());
        assert!(health.stats().cooldown_remaining > Duration::ZERO);
    }

    #[test]
    fn test_late_success_from_before_trip_keeps_breaker_open() {
        let health = HealthTracker::new(Duration::from_secs(60));
        let slow = admit(&health);
        let fast = admit(&health);

        health.record_failure(fast);
        health.record_success(slow);

        assert_eq!(health.status(), HealthState::Unhealthy);
        assert!(health.should_attempt().is_none());
        assert_eq!(health.stats().successes, 1);
    }

    #[tokio::test]
    async fn test_stale_failure_after_recovery_is_ignored() {
        let health = HealthTracker::new(Duration::from_millis(30));
        let slow = admit(&health);
        health.record_failure(admit(&health));
        tokio::time::sleep(Duration::from_millis(50)).await;
        health.record_success(admit(&health));
        assert!(health.is_healthy());

        health.record_failure(slow);
        assert!(health.is_healthy());
    }

    #[test]
    fn test_success_outside_trial_call_does_not_recover() {
        let health = HealthTracker::new(Duration::from_secs(60));
        let before = admit(&health);
        health.trip();
        health.record_success(before);
        assert!(!health.is_healthy());
    }

    #[test]
    fn test_trip_and_reset() {
        let health = HealthTracker::new(Duration::from_secs(60));
        health.trip();
        assert!(health.should_attempt().is_none());
        health.reset();
        assert!(health.should_attempt().is_some());
    }

    #[test]
    fn test_stats_count_calls() {
        let health = HealthTracker::new(Duration::from_secs(60));
        health.record_success(admit(&health));
        health.record_success(admit(&health));
        health.record_failure(admit(&health));
        let stats = health.stats();
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.status, HealthState::Unhealthy);
    }
}
