//! # tokio-emotion-orchestrator
//!
//! A resilient emotion-classification client over Tokio.
//!
//! ## Architecture
//!
//! Every request walks the same path; each step may answer early:
//! ```text
//! text → normalize → cache → rate limit → in-flight → primary → secondary → lexicon
//!                                                        ↓
//!                                           cache write → event bus → all waiters
//! ```
//!
//! The public surface is [`EmotionOrchestrator`]: `classify`, `classify_batch`,
//! `subscribe`, `clear_cache` and `health`. None of these ever return an
//! error; failures degrade into a lower-quality [`Classification`] whose
//! `provider_used` tag says where it came from.

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod batch;
pub mod config;
pub mod enhanced;
pub mod events;
pub mod lexicon;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod provider;

// Re-exports for convenience
pub use config::ClassifierConfig;
pub use events::{ClassificationEvent, EventBus, Subscription};
pub use lexicon::LexiconClassifier;
pub use normalize::{normalize, NormalizedKey};
pub use orchestrator::{EmotionOrchestrator, HealthReport, OrchestratorBuilder};
pub use provider::{EmotionProvider, ProviderRole, RemoteProvider, WireFormat};

/// `provider_used` tag for results produced by the local lexicon heuristic.
pub const PROVIDER_LOCAL: &str = "local";

/// `provider_used` tag for the low-confidence neutral default served when no
/// provider may be consulted (rate limited, or every step failed).
pub const PROVIDER_DEGRADED: &str = "degraded";

/// `provider_used` tag for empty input, which never reaches a provider.
pub const PROVIDER_NONE: &str = "none";

/// Confidence of the degraded neutral default.
pub const DEGRADED_CONFIDENCE: f64 = 0.3;

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`ClassifierError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), ClassifierError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| ClassifierError::Other(format!("tracing init failed: {e}")))
}

/// Classification errors.
///
/// These never escape [`EmotionOrchestrator::classify`] or
/// [`EmotionOrchestrator::classify_batch`]; they travel between the provider
/// adapters, the in-flight registry and the fallback chain. The type is
/// `Clone` so a single failure can be handed to every caller waiting on the
/// same computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// A provider did not answer within its time box.
    #[error("provider '{provider}' timed out after {timeout_ms}ms")]
    ProviderTimeout {
        /// Name of the provider that timed out.
        provider: String,
        /// The time box that elapsed.
        timeout_ms: u64,
    },

    /// A provider answered with a non-2xx status or a malformed body, or the
    /// connection failed.
    #[error("provider '{provider}' failed: {message}")]
    ProviderError {
        /// Name of the failing provider.
        provider: String,
        /// Human-readable failure detail.
        message: String,
    },

    /// A provider answered, but below the configured confidence floor.
    #[error("provider '{provider}' returned low confidence {confidence:.2}")]
    LowConfidence {
        /// Name of the provider.
        provider: String,
        /// The rejected confidence.
        confidence: f64,
    },

    /// The normalized key exhausted its request quota for the current window.
    #[error("rate limited")]
    RateLimited,

    /// The input was empty or whitespace-only.
    #[error("empty input")]
    EmptyInput,

    /// Every step of the fallback chain failed (only possible with the local
    /// heuristic disabled).
    #[error("all providers exhausted")]
    AllProvidersExhausted,

    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl ClassifierError {
    /// Whether this failure says the backend itself is unhealthy.
    ///
    /// A low-confidence answer proves the backend is reachable, so it does not
    /// count against the health tracker.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout { .. } | Self::ProviderError { .. }
        )
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProviderTimeout { .. } => "timeout",
            Self::ProviderError { .. } => "error",
            Self::LowConfidence { .. } => "low_confidence",
            Self::RateLimited => "rate_limited",
            Self::EmptyInput => "empty_input",
            Self::AllProvidersExhausted => "exhausted",
            Self::ConfigError(_) => "config",
            Self::Other(_) => "other",
        }
    }
}

/// The closed set of emotions this client reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    /// Happiness, excitement, delight.
    Joy,
    /// Sadness, grief, disappointment.
    Sadness,
    /// Anger, annoyance, disgust.
    Anger,
    /// Fear, anxiety, worry.
    Fear,
    /// Love, affection, gratitude.
    Love,
    /// Surprise, amazement, shock.
    Surprise,
    /// No clear emotional signal.
    Neutral,
}

impl Emotion {
    /// Every emotion, in reporting order.
    pub const ALL: [Emotion; 7] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Love,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Lowercase name, as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Love => "love",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }

    /// Map a free-form model label onto the closed emotion set.
    ///
    /// Matching is case-insensitive. Labels that mean nothing to us map to
    /// [`Emotion::Neutral`] rather than failing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tokio_emotion_orchestrator::Emotion;
    /// assert_eq!(Emotion::from_label("Happy"), Emotion::Joy);
    /// assert_eq!(Emotion::from_label("LABEL_3"), Emotion::Anger);
    /// assert_eq!(Emotion::from_label("bewildered"), Emotion::Neutral);
    /// ```
    pub fn from_label(label: &str) -> Emotion {
        match label.trim().to_lowercase().as_str() {
            "joy" | "happy" | "happiness" | "excitement" | "excited" | "delight" | "pleasure"
            | "cheerful" | "elated" | "optimism" | "amusement" | "label_1" => Emotion::Joy,
            "sadness" | "sad" | "unhappy" | "depressed" | "grief" | "sorrow"
            | "disappointment" | "remorse" | "label_0" => Emotion::Sadness,
            "anger" | "angry" | "furious" | "mad" | "annoyance" | "irritated" | "frustrated"
            | "disgust" | "disapproval" | "label_3" => Emotion::Anger,
            "fear" | "afraid" | "scared" | "frightened" | "anxious" | "worried" | "nervous"
            | "terrified" | "nervousness" | "label_4" => Emotion::Fear,
            "surprise" | "surprised" | "amazed" | "astonished" | "shocked" | "realization"
            | "label_5" => Emotion::Surprise,
            "love" | "affection" | "caring" | "admiration" | "gratitude" | "label_2" => {
                Emotion::Love
            }
            _ => Emotion::Neutral,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of classifying one text.
///
/// Immutable once constructed: `intensity` is always derived from
/// `confidence` at construction time. Callers receive clones; the cache keeps
/// its own copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    emotion: Emotion,
    confidence: f64,
    intensity: u8,
    provider_used: String,
}

impl Classification {
    /// Build a classification, clamping `confidence` into `[0, 1]` and
    /// deriving `intensity = round(confidence * 10)`.
    ///
    /// A NaN confidence is treated as `0.0`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tokio_emotion_orchestrator::{Classification, Emotion};
    /// let c = Classification::new(Emotion::Joy, 0.82, "primary");
    /// assert_eq!(c.intensity(), 8);
    /// ```
    pub fn new(emotion: Emotion, confidence: f64, provider_used: impl Into<String>) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            emotion,
            confidence,
            intensity: (confidence * 10.0).round() as u8,
            provider_used: provider_used.into(),
        }
    }

    /// The answer for empty or whitespace-only input: certain neutrality with
    /// zero intensity. This is the only classification whose intensity is not
    /// derived from its confidence.
    pub fn empty_input() -> Self {
        Self {
            emotion: Emotion::Neutral,
            confidence: 1.0,
            intensity: 0,
            provider_used: PROVIDER_NONE.to_string(),
        }
    }

    /// The low-confidence neutral default served when no provider could be
    /// consulted and nothing is cached.
    pub fn degraded() -> Self {
        Self::new(Emotion::Neutral, DEGRADED_CONFIDENCE, PROVIDER_DEGRADED)
    }

    /// Detected emotion.
    pub fn emotion(&self) -> Emotion {
        self.emotion
    }

    /// Confidence in `[0, 1]`.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Intensity in `[0, 10]`.
    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    /// Which provider produced this result (`"primary"`, `"local"`, …).
    pub fn provider_used(&self) -> &str {
        &self.provider_used
    }

    /// Whether this result came from something other than a remote model.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.provider_used.as_str(),
            PROVIDER_LOCAL | PROVIDER_DEGRADED
        )
    }
}
