//! Prometheus metrics for the classification pipeline.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_request`, `inc_provider_call`, …) are no-ops if `init_metrics` was
//! never called, so the orchestrator is always safe to run and observability
//! simply degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `emotion_requests_total` | Counter | `outcome` |
//! | `emotion_provider_calls_total` | Counter | `provider`, `result` |
//! | `emotion_provider_duration_seconds` | Histogram | `provider` |
//! | `emotion_events_published_total` | Counter | |
//! | `emotion_subscriber_faults_total` | Counter | |
//! | `emotion_cache_entries` | Gauge | |

use crate::ClassifierError;
use prometheus::{
    core::Collector, CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

// ── Outcome labels ─────────────────────────────────────────────────────────

/// `outcome` label: empty input short-circuit.
pub const OUTCOME_EMPTY: &str = "empty";
/// `outcome` label: fresh cache hit.
pub const OUTCOME_CACHE_HIT: &str = "cache_hit";
/// `outcome` label: denied by the rate limiter.
pub const OUTCOME_RATE_LIMITED: &str = "rate_limited";
/// `outcome` label: joined a computation already in flight.
pub const OUTCOME_DEDUPLICATED: &str = "deduplicated";
/// `outcome` label: led a fresh computation.
pub const OUTCOME_COMPUTED: &str = "computed";

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the classifier, stored in a single
/// [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Requests by how they were answered.
    pub requests_total: CounterVec,
    /// Provider calls by provider and result kind.
    pub provider_calls: CounterVec,
    /// Provider call latency.
    pub provider_duration: HistogramVec,
    /// Event Bus publishes.
    pub events_published: IntCounter,
    /// Subscriber handlers that panicked.
    pub subscriber_faults: IntCounter,
    /// Physically present cache entries.
    pub cache_entries: IntGauge,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn register<C>(registry: &Registry, collector: C) -> Result<C, ClassifierError>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| ClassifierError::Other(format!("metrics registration failed: {e}")))?;
    Ok(collector)
}

fn init_err(e: prometheus::Error) -> ClassifierError {
    ClassifierError::Other(format!("metrics init failed: {e}"))
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`ClassifierError::Other`] if metric construction or registry
/// registration fails.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), ClassifierError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = register(
        &registry,
        CounterVec::new(
            Opts::new("emotion_requests_total", "Classification requests by outcome"),
            &["outcome"],
        )
        .map_err(init_err)?,
    )?;

    let provider_calls = register(
        &registry,
        CounterVec::new(
            Opts::new(
                "emotion_provider_calls_total",
                "Provider calls by provider and result",
            ),
            &["provider", "result"],
        )
        .map_err(init_err)?,
    )?;

    let provider_duration = register(
        &registry,
        HistogramVec::new(
            HistogramOpts::new(
                "emotion_provider_duration_seconds",
                "Provider call latency",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]),
            &["provider"],
        )
        .map_err(init_err)?,
    )?;

    let events_published = register(
        &registry,
        IntCounter::new(
            "emotion_events_published_total",
            "Classification events published",
        )
        .map_err(init_err)?,
    )?;

    let subscriber_faults = register(
        &registry,
        IntCounter::new(
            "emotion_subscriber_faults_total",
            "Event subscribers that panicked during delivery",
        )
        .map_err(init_err)?,
    )?;

    let cache_entries = register(
        &registry,
        IntGauge::new("emotion_cache_entries", "Entries held by the result cache")
            .map_err(init_err)?,
    )?;

    // A racing initialiser builds identical descriptors; first one wins.
    let _ = METRICS.set(Metrics {
        registry,
        requests_total,
        provider_calls,
        provider_duration,
        events_published,
        subscriber_faults,
        cache_entries,
    });

    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count one classification request with the given `outcome` label.
///
/// No-op if metrics have not been initialised.
pub fn inc_request(outcome: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.requests_total.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
    }
}

/// Count one provider call. `result` is `"ok"` or an error kind such as
/// `"timeout"`.
///
/// No-op if metrics have not been initialised.
pub fn inc_provider_call(provider: &str, result: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .provider_calls
            .get_metric_with_label_values(&[provider, result])
        {
            c.inc();
        }
    }
}

/// Record how long one provider call took.
///
/// No-op if metrics have not been initialised.
pub fn record_provider_duration(provider: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(h) = m.provider_duration.get_metric_with_label_values(&[provider]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Count one Event Bus publish.
pub fn inc_event_published() {
    if let Some(m) = metrics() {
        m.events_published.inc();
    }
}

/// Count one subscriber that panicked.
pub fn inc_subscriber_fault() {
    if let Some(m) = metrics() {
        m.subscriber_faults.inc();
    }
}

/// Set the cache size gauge.
pub fn set_cache_entries(entries: usize) {
    if let Some(m) = metrics() {
        m.cache_entries.set(i64::try_from(entries).unwrap_or(i64::MAX));
    }
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
///
/// # Panics
///
/// This function never panics.
pub fn gather() -> String {
    let Some(m) = metrics() else {
        return String::new();
    };
    let families = m.registry.gather();
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Snapshot of the counters, keyed by label value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricsSummary {
    /// Request counts keyed by `outcome`.
    pub requests: HashMap<String, u64>,
    /// Provider call counts keyed by `"provider:result"`.
    pub provider_calls: HashMap<String, u64>,
    /// Total Event Bus publishes.
    pub events_published: u64,
    /// Total subscriber faults.
    pub subscriber_faults: u64,
}

fn label<'a>(metric: &'a prometheus::proto::Metric, name: &str) -> &'a str {
    metric
        .get_label()
        .iter()
        .find(|l| l.get_name() == name)
        .map_or("unknown", |l| l.get_value())
}

/// Return a structured summary of current counter values.
///
/// Returns a zeroed [`MetricsSummary`] if metrics have not been initialised.
pub fn get_metrics_summary() -> MetricsSummary {
    let Some(m) = metrics() else {
        return MetricsSummary::default();
    };

    let mut summary = MetricsSummary {
        events_published: m.events_published.get(),
        subscriber_faults: m.subscriber_faults.get(),
        ..MetricsSummary::default()
    };

    for family in m.requests_total.collect() {
        for metric in family.get_metric() {
            let value = metric.get_counter().get_value() as u64;
            summary
                .requests
                .insert(label(metric, "outcome").to_string(), value);
        }
    }

    for family in m.provider_calls.collect() {
        for metric in family.get_metric() {
            let key = format!("{}:{}", label(metric, "provider"), label(metric, "result"));
            let value = metric.get_counter().get_value() as u64;
            summary.provider_calls.insert(key, value);
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    // The global registry cannot be reset between tests, so assertions on it
    // only check monotonic growth.

    #[test]
    fn test_init_metrics_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_request_counter_increments() {
        init_metrics().expect("test: init");
        let before = get_metrics_summary()
            .requests
            .get(OUTCOME_CACHE_HIT)
            .copied()
            .unwrap_or(0);
        inc_request(OUTCOME_CACHE_HIT);
        inc_request(OUTCOME_CACHE_HIT);
        let after = get_metrics_summary()
            .requests
            .get(OUTCOME_CACHE_HIT)
            .copied()
            .unwrap_or(0);
        assert!(after >= before + 2);
    }

    #[test]
    fn test_provider_call_keyed_by_provider_and_result() {
        init_metrics().expect("test: init");
        inc_provider_call("metrics-test-provider", "timeout");
        let summary = get_metrics_summary();
        assert!(summary
            .provider_calls
            .contains_key("metrics-test-provider:timeout"));
    }

    #[test]
    fn test_gather_exposes_metric_names() {
        init_metrics().expect("test: init");
        inc_request(OUTCOME_COMPUTED);
        record_provider_duration("primary", Duration::from_millis(12));
        inc_event_published();
        set_cache_entries(3);
        let text = gather();
        assert!(text.contains("emotion_requests_total"));
        assert!(text.contains("emotion_provider_duration_seconds"));
        assert!(text.contains("emotion_events_published_total"));
        assert!(text.contains("emotion_cache_entries"));
    }

    #[test]
    fn test_subscriber_faults_counted() {
        init_metrics().expect("test: init");
        let before = get_metrics_summary().subscriber_faults;
        inc_subscriber_fault();
        assert!(get_metrics_summary().subscriber_faults > before);
    }
}
