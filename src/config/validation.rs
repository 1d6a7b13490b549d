//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`ClassifierConfig`] that cannot
//! be expressed through the type system alone (range checks, cross-field
//! invariants).
//!
//! ## Guarantees
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use super::{ClassifierConfig, ProviderConfig};
use crate::provider::WireFormat;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "rate_limit.quota").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Validate all semantic constraints on a [`ClassifierConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &ClassifierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Cache ────────────────────────────────────────────────────────
    if config.cache.max_entries == 0 {
        errors.push(invalid("cache.max_entries", 0, "must be at least 1"));
    }

    // ── Rate limit ───────────────────────────────────────────────────
    if config.rate_limit.window_ms == 0 {
        errors.push(invalid("rate_limit.window_ms", 0, "must be at least 1ms"));
    }
    if config.rate_limit.quota == 0 {
        errors.push(invalid("rate_limit.quota", 0, "must be at least 1"));
    }

    // ── Health ───────────────────────────────────────────────────────
    if config.health.cooldown_ms == 0 {
        errors.push(invalid("health.cooldown_ms", 0, "must be at least 1ms"));
    }

    // ── Batch / normalizer ───────────────────────────────────────────
    if config.batch.max_size == 0 {
        errors.push(invalid("batch.max_size", 0, "must be at least 1"));
    }
    if config.normalizer.max_key_chars == 0 {
        errors.push(invalid("normalizer.max_key_chars", 0, "must be at least 1"));
    }

    // ── Lexicon ──────────────────────────────────────────────────────
    if !(config.lexicon.neutral_bias >= 0.0) {
        errors.push(invalid(
            "lexicon.neutral_bias",
            config.lexicon.neutral_bias,
            "must be non-negative",
        ));
    }
    if !(0.0..=1.0).contains(&config.lexicon.confidence_cap) {
        errors.push(invalid(
            "lexicon.confidence_cap",
            config.lexicon.confidence_cap,
            "must be between 0.0 and 1.0",
        ));
    }
    if config.lexicon.negation_window == 0 {
        errors.push(invalid("lexicon.negation_window", 0, "must be at least 1"));
    }

    // ── Providers ────────────────────────────────────────────────────
    if !(0.0..=1.0).contains(&config.providers.min_confidence) {
        errors.push(invalid(
            "providers.min_confidence",
            config.providers.min_confidence,
            "must be between 0.0 and 1.0",
        ));
    }
    if let Some(primary) = &config.providers.primary {
        validate_provider("providers.primary", primary, &mut errors);
    }
    if let Some(secondary) = &config.providers.secondary {
        validate_provider("providers.secondary", secondary, &mut errors);
    }
    if let (Some(primary), Some(secondary)) =
        (&config.providers.primary, &config.providers.secondary)
    {
        let primary_name = primary.name.as_deref().unwrap_or("primary");
        let secondary_name = secondary.name.as_deref().unwrap_or("secondary");
        if primary_name == secondary_name {
            errors.push(invalid(
                "providers.secondary.name",
                secondary_name,
                "must differ from the primary provider name",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_provider(path: &str, provider: &ProviderConfig, errors: &mut Vec<ConfigError>) {
    if !is_http_url(&provider.url) {
        errors.push(invalid(
            &format!("{path}.url"),
            format!("{:?}", provider.url),
            "must be an http:// or https:// URL",
        ));
    }
    if let Some(batch_url) = &provider.batch_url {
        if !is_http_url(batch_url) {
            errors.push(invalid(
                &format!("{path}.batch_url"),
                format!("{batch_url:?}"),
                "must be an http:// or https:// URL",
            ));
        }
    }
    if provider.timeout_ms == Some(0) {
        errors.push(invalid(
            &format!("{path}.timeout_ms"),
            0,
            "must be at least 1ms",
        ));
    }
    if let Some(name) = &provider.name {
        if name.trim().is_empty() {
            errors.push(invalid(&format!("{path}.name"), "\"\"", "must not be empty"));
        }
    }
    if let Some(model) = &provider.model {
        if model.trim().is_empty() {
            errors.push(invalid(&format!("{path}.model"), "\"\"", "must not be empty"));
        }
    }
    if provider.format == WireFormat::ChatCompletion && provider.batch_url.is_some() {
        errors.push(invalid(
            &format!("{path}.batch_url"),
            "set",
            "chat_completion endpoints have no batch call",
        ));
    }
    if let Some(env) = &provider.api_key_env {
        if env.trim().is_empty() {
            errors.push(invalid(
                &format!("{path}.api_key_env"),
                "\"\"",
                "must not be empty",
            ));
        }
    }
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.trim().is_empty())
}
