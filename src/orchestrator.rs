//! # Fallback Orchestrator
//!
//! ## Responsibility
//! Answer `classify(text)` with a best-effort [`Classification`] under tight
//! latency budgets, over an unreliable multi-provider backend.
//!
//! Each request walks, in order:
//! 1. normalize; empty input answers `{neutral, 1.0, intensity 0}` at once
//! 2. fresh cache hit: returned as-is, nothing published
//! 3. rate limit: a denied key gets its stale cached value or the degraded
//!    neutral default, and no provider is called
//! 4. in-flight: join a computation already pending for the key
//! 5. primary, if the health tracker admits it; a failure marks it unhealthy
//! 6. secondary providers, each under its own timeout
//! 7. the local lexicon, which never fails
//!
//! A computed result is written to the cache and published on the Event Bus
//! exactly once, by the computation that produced it.
//!
//! ## Guarantees
//! - `classify` never returns an error and never panics
//! - At most one provider computation is outstanding per normalized key,
//!   across `classify` and `classify_batch`
//! - While the primary is unhealthy and cooling down it is never called
//! - Only the probe admitted after a cooldown can mark the primary healthy
//! - Independent instances share no state
//!
//! ## NOT Responsible For
//! - Wire formats (that belongs to `provider`)
//! - Batch splitting (that belongs to `batch`)

use crate::config::{validation, ClassifierConfig};
use crate::enhanced::{
    CacheStats, HealthAttempt, HealthState, HealthStats, HealthTracker, InFlightRegistry,
    InFlightRole, RateLimitInfo, RateLimiter, ResultCache,
};
use crate::events::{ClassificationEvent, EventBus, Subscription};
use crate::lexicon::LexiconClassifier;
use crate::metrics::{
    self, OUTCOME_CACHE_HIT, OUTCOME_COMPUTED, OUTCOME_DEDUPLICATED, OUTCOME_EMPTY,
    OUTCOME_RATE_LIMITED,
};
use crate::normalize::{normalize_with_limit, NormalizedKey};
use crate::provider::{EmotionProvider, ProviderRole, RemoteProvider};
use crate::{Classification, ClassifierError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One remote step of the fallback chain.
pub(crate) struct ProviderSlot {
    pub(crate) provider: Arc<dyn EmotionProvider>,
    pub(crate) timeout: Duration,
    pub(crate) role: ProviderRole,
}

impl ProviderSlot {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

pub(crate) struct Inner {
    pub(crate) config: ClassifierConfig,
    pub(crate) cache: ResultCache,
    pub(crate) limiter: RateLimiter,
    pub(crate) health: HealthTracker,
    pub(crate) inflight: InFlightRegistry,
    pub(crate) events: EventBus,
    pub(crate) remotes: Vec<ProviderSlot>,
    pub(crate) lexicon: Option<LexiconClassifier>,
}

/// Resilient emotion classifier.
///
/// Cheap to clone; clones share the cache, rate windows, health state,
/// in-flight registry and Event Bus.
///
/// ## Example
///
/// ```no_run
/// use tokio_emotion_orchestrator::{ClassifierConfig, EmotionOrchestrator};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tokio_emotion_orchestrator::ClassifierError> {
/// let orchestrator = EmotionOrchestrator::from_config(&ClassifierConfig::default())?;
/// let subscription = orchestrator.subscribe(|event| {
///     println!("{} -> {}", event.key, event.classification.emotion());
/// });
///
/// let result = orchestrator.classify("I am so happy today!").await;
/// println!("{} ({:.2})", result.emotion(), result.confidence());
/// subscription.unsubscribe();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EmotionOrchestrator {
    pub(crate) inner: Arc<Inner>,
}

/// Builder for [`EmotionOrchestrator`] with injected providers.
pub struct OrchestratorBuilder {
    config: ClassifierConfig,
    primary: Option<ProviderSlot>,
    secondaries: Vec<ProviderSlot>,
    lexicon: Option<LexiconClassifier>,
    events: Option<EventBus>,
}

impl OrchestratorBuilder {
    /// Set the primary provider, guarded by the health tracker.
    pub fn primary(mut self, provider: Arc<dyn EmotionProvider>, timeout: Duration) -> Self {
        self.primary = Some(ProviderSlot {
            provider,
            timeout,
            role: ProviderRole::Primary,
        });
        self
    }

    /// Append a secondary provider. Secondaries are tried in the order added.
    pub fn secondary(mut self, provider: Arc<dyn EmotionProvider>, timeout: Duration) -> Self {
        self.secondaries.push(ProviderSlot {
            provider,
            timeout,
            role: ProviderRole::Secondary,
        });
        self
    }

    /// Replace the lexicon built from `[lexicon]`. Ignored when the lexicon
    /// is disabled in config.
    pub fn lexicon(mut self, lexicon: LexiconClassifier) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    /// Publish on an existing bus instead of a fresh one.
    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Validate the config and assemble the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::ConfigError`] listing every violated
    /// constraint.
    pub fn build(self) -> Result<EmotionOrchestrator, ClassifierError> {
        validation::validate(&self.config).map_err(|errors| {
            ClassifierError::ConfigError(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        let config = self.config;
        let lexicon = if config.lexicon.enabled {
            Some(
                self.lexicon
                    .unwrap_or_else(|| LexiconClassifier::new(&config.lexicon)),
            )
        } else {
            None
        };
        let remotes: Vec<ProviderSlot> =
            self.primary.into_iter().chain(self.secondaries).collect();

        info!(
            providers = ?remotes.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            lexicon = lexicon.is_some(),
            cache_ttl_ms = config.cache.ttl_ms,
            rate_quota = config.rate_limit.quota,
            "emotion orchestrator ready"
        );

        Ok(EmotionOrchestrator {
            inner: Arc::new(Inner {
                cache: ResultCache::new(config.cache_ttl(), config.cache.max_entries),
                limiter: RateLimiter::new(config.rate_limit.quota, config.rate_window()),
                health: HealthTracker::new(config.health_cooldown()),
                inflight: InFlightRegistry::new(),
                events: self.events.unwrap_or_default(),
                remotes,
                lexicon,
                config,
            }),
        })
    }
}

/// Health of the primary provider, as exposed to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    /// Whether the primary is currently considered healthy.
    pub healthy: bool,
    /// Tracker state.
    pub status: HealthState,
    /// Time left before the next probe is admitted.
    pub cooldown_remaining: Duration,
}

/// Point-in-time view of the orchestrator's shared state.
#[derive(Debug, Clone)]
pub struct OrchestratorStats {
    /// Result cache occupancy.
    pub cache: CacheStats,
    /// Computations currently in flight.
    pub in_flight: usize,
    /// Primary health tracker.
    pub health: HealthStats,
    /// Registered Event Bus subscribers.
    pub subscribers: usize,
    /// Keys with a live rate window.
    pub rate_limited_keys: usize,
}

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired or excess cache entries removed.
    pub cache_entries: usize,
    /// Idle rate windows dropped.
    pub rate_windows: usize,
}

impl EmotionOrchestrator {
    /// Start a builder over `config` with no remote providers.
    pub fn builder(config: ClassifierConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            primary: None,
            secondaries: Vec::new(),
            lexicon: None,
            events: None,
        }
    }

    /// Build an orchestrator with HTTP providers from `[providers]`.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::ConfigError`] if the config fails
    /// validation.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let mut builder = Self::builder(config.clone());
        if let Some(primary) = &config.providers.primary {
            let provider = RemoteProvider::from_config(primary, ProviderRole::Primary);
            let timeout = provider.timeout();
            builder = builder.primary(Arc::new(provider), timeout);
        }
        if let Some(secondary) = &config.providers.secondary {
            let provider = RemoteProvider::from_config(secondary, ProviderRole::Secondary);
            let timeout = provider.timeout();
            builder = builder.secondary(Arc::new(provider), timeout);
        }
        builder.build()
    }

    /// Classify one text. Never fails; see the module docs for the order in
    /// which answers are tried.
    pub async fn classify(&self, text: &str) -> Classification {
        let key = self.key_for(text);
        if key.is_empty() {
            metrics::inc_request(OUTCOME_EMPTY);
            debug!("empty input");
            return Classification::empty_input();
        }

        if let Some(hit) = self.inner.cache.get(&key) {
            metrics::inc_request(OUTCOME_CACHE_HIT);
            debug!(key = %key, provider = hit.provider_used(), "cache hit");
            return hit;
        }

        if !self.inner.limiter.allow(&key) {
            return self.rate_limited(&key);
        }
        debug!(key = %key, "cache miss");

        self.classify_admitted(&key, text).await
    }

    /// Steps 4-7 for a key that already passed the cache and rate limiter.
    pub(crate) async fn classify_admitted(
        &self,
        key: &NormalizedKey,
        text: &str,
    ) -> Classification {
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task_text = text.to_string();
        let (result, role) = self
            .inner
            .inflight
            .join_or_start(key, async move { inner.compute(&task_key, &task_text).await })
            .await;

        metrics::inc_request(match role {
            InFlightRole::Leader => OUTCOME_COMPUTED,
            InFlightRole::Follower => OUTCOME_DEDUPLICATED,
        });

        self.settle(key, text, result)
    }

    /// Turn a computation result into this caller's answer. Failures fall
    /// back to the lexicon, else the degraded default.
    pub(crate) fn settle(
        &self,
        key: &NormalizedKey,
        text: &str,
        result: Result<Classification, ClassifierError>,
    ) -> Classification {
        match result {
            Ok(classification) => classification,
            Err(e) => {
                warn!(key = %key, error = %e, "classification failed; degrading locally");
                match &self.inner.lexicon {
                    Some(lexicon) => lexicon.classify(text),
                    None => Classification::degraded(),
                }
            }
        }
    }

    /// Stale cached value or the degraded default for a denied key.
    pub(crate) fn rate_limited(&self, key: &NormalizedKey) -> Classification {
        metrics::inc_request(OUTCOME_RATE_LIMITED);
        match self.inner.cache.get_stale(key) {
            Some(stale) => {
                warn!(key = %key, "rate limited; serving cached result");
                stale
            }
            None => {
                warn!(key = %key, "rate limited; serving degraded default");
                Classification::degraded()
            }
        }
    }

    pub(crate) fn key_for(&self, text: &str) -> NormalizedKey {
        normalize_with_limit(text, self.inner.config.normalizer.max_key_chars)
    }

    /// Register an observer of freshly computed classifications.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ClassificationEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(handler)
    }

    /// The Event Bus results are published on.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        metrics::set_cache_entries(0);
        info!("result cache cleared");
    }

    /// Health of the primary provider.
    pub fn health(&self) -> HealthReport {
        let stats = self.inner.health.stats();
        HealthReport {
            healthy: stats.status == HealthState::Healthy,
            status: stats.status,
            cooldown_remaining: stats.cooldown_remaining,
        }
    }

    /// Snapshot of cache, in-flight, health and subscriber state.
    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            cache: self.inner.cache.stats(),
            in_flight: self.inner.inflight.pending(),
            health: self.inner.health.stats(),
            subscribers: self.inner.events.subscriber_count(),
            rate_limited_keys: self.inner.limiter.tracked_keys(),
        }
    }

    /// Quota usage for the key `text` normalizes to.
    pub fn rate_limit_usage(&self, text: &str) -> Option<RateLimitInfo> {
        self.inner.limiter.usage(&self.key_for(text))
    }

    /// Names of the chain's steps, in the order they are tried.
    pub fn provider_chain(&self) -> Vec<String> {
        let mut chain: Vec<String> = self
            .inner
            .remotes
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        if self.inner.lexicon.is_some() {
            chain.push(crate::PROVIDER_LOCAL.to_string());
        }
        chain
    }

    /// The validated configuration this instance runs with.
    pub fn config(&self) -> &ClassifierConfig {
        &self.inner.config
    }

    /// Physically remove expired cache entries and idle rate windows.
    pub fn sweep(&self) -> SweepReport {
        self.inner.sweep()
    }

    /// Run [`sweep`](Self::sweep) every `interval` on the current runtime.
    ///
    /// The task ends on its own once every clone of the orchestrator is
    /// dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let interval = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("orchestrator dropped; sweeper exiting");
                    break;
                };
                inner.sweep();
            }
        })
    }
}

impl Inner {
    /// Run the chain for `text`, then cache and publish the result.
    pub(crate) async fn compute(
        &self,
        key: &NormalizedKey,
        text: &str,
    ) -> Result<Classification, ClassifierError> {
        let classification = self.run_chain(text).await?;
        self.store_and_publish(key, &classification);
        Ok(classification)
    }

    pub(crate) fn store_and_publish(&self, key: &NormalizedKey, classification: &Classification) {
        self.cache.put(key, classification.clone());
        metrics::set_cache_entries(self.cache.len());
        self.events
            .publish(&ClassificationEvent::new(key.clone(), classification.clone()));
    }

    async fn run_chain(&self, text: &str) -> Result<Classification, ClassifierError> {
        for slot in &self.remotes {
            let Some(attempt) = self.admit(slot) else {
                debug!(provider = slot.name(), "primary unhealthy; skipping");
                continue;
            };

            let started = Instant::now();
            let call = tokio::time::timeout(slot.timeout, slot.provider.classify(text));
            let outcome = match call.await {
                Ok(result) => result,
                Err(_) => Err(ClassifierError::ProviderTimeout {
                    provider: slot.name().to_string(),
                    timeout_ms: slot.timeout_ms(),
                }),
            }
            .and_then(|c| self.check_confidence(slot, c));
            self.record_outcome(slot, attempt, started, outcome.as_ref().err());

            match outcome {
                Ok(classification) => {
                    info!(
                        provider = slot.name(),
                        emotion = %classification.emotion(),
                        confidence = classification.confidence(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "provider answered"
                    );
                    return Ok(classification);
                }
                Err(e) => {
                    warn!(
                        provider = slot.name(),
                        error = %e,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "provider failed; falling back"
                    );
                }
            }
        }

        match &self.lexicon {
            Some(lexicon) => {
                metrics::inc_provider_call(crate::PROVIDER_LOCAL, "ok");
                Ok(lexicon.classify(text))
            }
            None => Err(ClassifierError::AllProvidersExhausted),
        }
    }

    /// Whether any remote can take a batch call.
    pub(crate) fn has_batch_provider(&self) -> bool {
        self.remotes.iter().any(|slot| slot.provider.supports_batch())
    }

    /// Call every remote that supports batching, in chain order, until one
    /// returns a complete result.
    pub(crate) async fn run_batch_chain(
        &self,
        texts: &[String],
    ) -> Result<Vec<Classification>, ClassifierError> {
        let mut last_error = ClassifierError::AllProvidersExhausted;
        for slot in &self.remotes {
            if !slot.provider.supports_batch() {
                continue;
            }
            let Some(attempt) = self.admit(slot) else {
                debug!(provider = slot.name(), "primary unhealthy; skipping batch");
                continue;
            };

            let started = Instant::now();
            let call = tokio::time::timeout(slot.timeout, slot.provider.classify_batch(texts));
            let outcome = match call.await {
                Ok(Ok(results)) if results.len() == texts.len() => Ok(results),
                Ok(Ok(results)) => Err(ClassifierError::ProviderError {
                    provider: slot.name().to_string(),
                    message: format!(
                        "expected {} results, got {}",
                        texts.len(),
                        results.len()
                    ),
                }),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ClassifierError::ProviderTimeout {
                    provider: slot.name().to_string(),
                    timeout_ms: slot.timeout_ms(),
                }),
            };
            self.record_outcome(slot, attempt, started, outcome.as_ref().err());

            match outcome {
                Ok(results) => {
                    info!(
                        provider = slot.name(),
                        count = texts.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "batch answered"
                    );
                    return Ok(results);
                }
                Err(e) => {
                    warn!(
                        provider = slot.name(),
                        count = texts.len(),
                        error = %e,
                        "batch call failed"
                    );
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn check_confidence(
        &self,
        slot: &ProviderSlot,
        classification: Classification,
    ) -> Result<Classification, ClassifierError> {
        if classification.confidence() < self.config.providers.min_confidence {
            Err(ClassifierError::LowConfidence {
                provider: slot.name().to_string(),
                confidence: classification.confidence(),
            })
        } else {
            Ok(classification)
        }
    }

    /// Health admission for `slot`. Non-primary slots are always admitted
    /// and carry no attempt; `None` means skip the slot.
    fn admit(&self, slot: &ProviderSlot) -> Option<Option<HealthAttempt>> {
        if slot.role == ProviderRole::Primary {
            self.health.should_attempt().map(Some)
        } else {
            Some(None)
        }
    }

    /// Metrics and, for the primary, the health transition.
    fn record_outcome(
        &self,
        slot: &ProviderSlot,
        attempt: Option<HealthAttempt>,
        started: Instant,
        error: Option<&ClassifierError>,
    ) {
        metrics::record_provider_duration(slot.name(), started.elapsed());
        metrics::inc_provider_call(slot.name(), error.map_or("ok", ClassifierError::kind));

        let Some(attempt) = attempt else {
            return;
        };
        match error {
            Some(e) if e.is_backend_failure() => self.health.record_failure(attempt),
            // The backend answered, even if below the confidence floor.
            _ => self.health.record_success(attempt),
        }
    }

    fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            cache_entries: self.cache.evict_expired_and_excess(),
            rate_windows: self.limiter.prune(),
        };
        metrics::set_cache_entries(self.cache.len());
        if report != SweepReport::default() {
            debug!(
                cache_entries = report.cache_entries,
                rate_windows = report.rate_windows,
                "sweep complete"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Emotion;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        emotion: Emotion,
        confidence: f64,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn ok(name: &'static str, emotion: Emotion, confidence: f64) -> Arc<Self> {
            Arc::new(Self {
                name,
                emotion,
                confidence,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                emotion: Emotion::Neutral,
                confidence: 0.0,
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmotionProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn classify(&self, _text: &str) -> Result<Classification, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ClassifierError::ProviderError {
                    provider: self.name.into(),
                    message: "HTTP 503".into(),
                })
            } else {
                Ok(Classification::new(self.emotion, self.confidence, self.name))
            }
        }
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let mut config = ClassifierConfig::default();
        config.rate_limit.quota = 0;
        let result = EmotionOrchestrator::builder(config).build();
        assert!(matches!(result, Err(ClassifierError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_provider_chain_order() {
        let orchestrator = EmotionOrchestrator::builder(ClassifierConfig::default())
            .secondary(Fixed::ok("hosted", Emotion::Joy, 0.9), Duration::from_secs(1))
            .primary(Fixed::ok("primary", Emotion::Joy, 0.9), Duration::from_secs(1))
            .build()
            .expect("test: build");
        assert_eq!(orchestrator.provider_chain(), vec!["primary", "hosted", "local"]);
    }

    #[tokio::test]
    async fn test_low_confidence_moves_on_without_tripping_primary() {
        let primary = Fixed::ok("primary", Emotion::Joy, 0.1);
        let secondary = Fixed::ok("secondary", Emotion::Fear, 0.8);
        let orchestrator = EmotionOrchestrator::builder(ClassifierConfig::default())
            .primary(primary.clone(), Duration::from_secs(1))
            .secondary(secondary.clone(), Duration::from_secs(1))
            .build()
            .expect("test: build");

        let result = orchestrator.classify("unsure").await;
        assert_eq!(result.provider_used(), "secondary");
        assert_eq!(result.emotion(), Emotion::Fear);
        assert!(orchestrator.health().healthy);
    }

    #[tokio::test]
    async fn test_disabled_lexicon_degrades_when_everything_fails() {
        let mut config = ClassifierConfig::default();
        config.lexicon.enabled = false;
        let orchestrator = EmotionOrchestrator::builder(config)
            .primary(Fixed::failing("primary"), Duration::from_secs(1))
            .build()
            .expect("test: build");

        let result = orchestrator.classify("anything at all").await;
        assert_eq!(result, Classification::degraded());
        // Failures are never cached.
        assert_eq!(orchestrator.stats().cache.entries, 0);
        assert_eq!(orchestrator.provider_chain(), vec!["primary"]);
    }

    #[tokio::test]
    async fn test_sweep_reports_expired_entries() {
        let mut config = ClassifierConfig::default();
        config.cache.ttl_ms = 10;
        let orchestrator = EmotionOrchestrator::builder(config)
            .build()
            .expect("test: build");

        orchestrator.classify("I love this").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let report = orchestrator.sweep();
        assert_eq!(report.cache_entries, 1);
        assert_eq!(orchestrator.stats().cache.entries, 0);
    }

    #[tokio::test]
    async fn test_sweeper_exits_when_orchestrator_dropped() {
        let orchestrator = EmotionOrchestrator::builder(ClassifierConfig::default())
            .build()
            .expect("test: build");
        let handle = orchestrator.spawn_sweeper(Duration::from_millis(5));
        drop(orchestrator);
        let finished = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(finished.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limit_usage_tracks_key() {
        let mut config = ClassifierConfig::default();
        config.rate_limit.quota = 3;
        let orchestrator = EmotionOrchestrator::builder(config)
            .build()
            .expect("test: build");
        orchestrator.classify("Counting Text").await;
        let usage = orchestrator
            .rate_limit_usage("  counting   text ")
            .expect("test: usage tracked");
        assert_eq!(usage.used, 1);
        assert_eq!(usage.remaining, 2);
    }
}
