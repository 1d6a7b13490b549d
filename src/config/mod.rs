//! # Classifier Configuration
//!
//! ## Responsibility
//! Parse and validate the TOML configuration of an [`EmotionOrchestrator`]:
//! cache bounds, rate-limit window, health cooldown, batch size, lexicon
//! tuning and the remote provider endpoints.
//!
//! ## Guarantees
//! - Every field has a documented default; an empty file is a valid config
//! - Validated: semantic constraints are checked before a config is accepted
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building providers from config (that belongs to `orchestrator`)
//! - Talking to providers (that belongs to `provider`)
//!
//! [`EmotionOrchestrator`]: crate::EmotionOrchestrator

pub mod loader;
pub mod validation;

use crate::provider::WireFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Default value functions ──────────────────────────────────────────────

/// Default cache TTL: 15 minutes.
fn default_cache_ttl_ms() -> u64 {
    15 * 60 * 1000
}

/// Default cache capacity.
fn default_cache_max_entries() -> usize {
    500
}

/// Default rate-limit window: 60 seconds.
fn default_rate_window_ms() -> u64 {
    60_000
}

/// Default requests per key per window.
fn default_rate_quota() -> usize {
    15
}

/// Default health cooldown: 2 minutes.
fn default_health_cooldown_ms() -> u64 {
    120_000
}

/// Default maximum texts per provider batch call.
fn default_batch_max_size() -> usize {
    25
}

/// Default key length cap, in characters.
fn default_max_key_chars() -> usize {
    crate::normalize::DEFAULT_MAX_KEY_CHARS
}

/// Default bias added to neutral by the lexicon.
fn default_neutral_bias() -> f64 {
    0.1
}

/// Default lexicon confidence ceiling.
fn default_confidence_cap() -> f64 {
    0.7
}

/// Default negation lookback, in tokens.
fn default_negation_window() -> usize {
    3
}

/// Default minimum confidence accepted from a remote provider.
fn default_min_confidence() -> f64 {
    0.3
}

/// Default primary provider timeout: 4 seconds.
fn default_primary_timeout_ms() -> u64 {
    4_000
}

/// Default secondary provider timeout: 12 seconds.
fn default_secondary_timeout_ms() -> u64 {
    12_000
}

/// Default enabled state: true.
fn default_true() -> bool {
    true
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for an orchestrator instance.
///
/// # Example
///
/// ```toml
/// [cache]
/// ttl_ms = 900000
/// max_entries = 500
///
/// [providers.primary]
/// url = "http://localhost:8000/api/detect-emotion"
/// timeout_ms = 4000
/// ```
///
/// # Panics
///
/// This type never panics during construction or access.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Result cache settings.
    pub cache: CacheConfig,
    /// Per-key rate limiting.
    pub rate_limit: RateLimitConfig,
    /// Primary-provider circuit breaker.
    pub health: HealthConfig,
    /// Batch coordinator settings.
    pub batch: BatchConfig,
    /// Key normalization settings.
    pub normalizer: NormalizerConfig,
    /// Local lexicon heuristic settings.
    pub lexicon: LexiconConfig,
    /// Remote provider endpoints.
    pub providers: ProvidersConfig,
}

impl ClassifierConfig {
    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }

    /// Rate-limit window as a [`Duration`].
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit.window_ms)
    }

    /// Health cooldown as a [`Duration`].
    pub fn health_cooldown(&self) -> Duration {
        Duration::from_millis(self.health.cooldown_ms)
    }
}

/// Result cache configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries older than this (ms) read as misses. Zero disables fresh hits.
    pub ttl_ms: u64,
    /// Maximum entries before the oldest writes are evicted.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_cache_ttl_ms(),
            max_entries: default_cache_max_entries(),
        }
    }
}

/// Rate limiter configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sliding window length in milliseconds.
    pub window_ms: u64,
    /// Requests admitted per key per window.
    pub quota: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_rate_window_ms(),
            quota: default_rate_quota(),
        }
    }
}

/// Health tracker configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Milliseconds to skip the primary after a failure before probing it.
    pub cooldown_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_health_cooldown_ms(),
        }
    }
}

/// Batch coordinator configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum texts sent to a provider in one batch call.
    pub max_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
        }
    }
}

/// Normalizer configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Characters kept in a normalized key.
    pub max_key_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_key_chars: default_max_key_chars(),
        }
    }
}

/// Local lexicon heuristic configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct LexiconConfig {
    /// Whether the lexicon runs as the last fallback step.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Score added to neutral before picking a winner.
    pub neutral_bias: f64,
    /// Upper bound on lexicon confidence.
    pub confidence_cap: f64,
    /// How many preceding tokens a negation word reaches.
    pub negation_window: usize,
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            neutral_bias: default_neutral_bias(),
            confidence_cap: default_confidence_cap(),
            negation_window: default_negation_window(),
        }
    }
}

/// Remote provider configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Remote results below this confidence are rejected and the chain moves on.
    pub min_confidence: f64,
    /// Primary classification service. `None` skips straight to the secondary.
    pub primary: Option<ProviderConfig>,
    /// Secondary model provider. `None` skips straight to the lexicon.
    pub secondary: Option<ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            primary: None,
            secondary: None,
        }
    }
}

/// One remote provider endpoint.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ProviderConfig {
    /// Name reported in `provider_used`. Defaults to the role name.
    pub name: Option<String>,
    /// Single-text endpoint.
    pub url: String,
    /// Batch endpoint. `None` disables batch calls to this provider.
    pub batch_url: Option<String>,
    /// Environment variable holding a bearer token.
    pub api_key_env: Option<String>,
    /// Wire format spoken by the endpoint.
    #[serde(default)]
    pub format: WireFormat,
    /// Time box for one call, in milliseconds. `None` uses the role default.
    pub timeout_ms: Option<u64>,
    /// Model requested from a `chat_completion` endpoint. `None` uses
    /// [`DEFAULT_CHAT_MODEL`](crate::provider::DEFAULT_CHAT_MODEL).
    pub model: Option<String>,
}

impl ProviderConfig {
    /// Effective timeout for the primary role.
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or_else(default_primary_timeout_ms))
    }

    /// Effective timeout for the secondary role.
    pub fn secondary_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or_else(default_secondary_timeout_ms))
    }
}

/// Export the JSON Schema for `ClassifierConfig`.
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
///
/// # Panics
///
/// This function never panics.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(ClassifierConfig);
    serde_json::to_string_pretty(&schema)
}
