//! Configuration file loading.
//!
//! Reads TOML into a [`ClassifierConfig`] and refuses to hand back anything
//! that fails [`validation::validate`]. Every error names its source, either
//! the file path or the `source_name` given to [`load_from_str`].

use std::path::Path;

use super::validation::{self, ConfigError};
use super::ClassifierConfig;

/// Read and validate the classifier config at `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] when the file is unreadable, otherwise whatever
/// [`load_from_str`] reports.
pub fn load_from_file(path: &Path) -> Result<ClassifierConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Parse and validate `content`; `source_name` labels parse errors.
///
/// # Errors
///
/// [`ConfigError::Parse`] for malformed TOML or an unknown wire format, and
/// [`ConfigError::Validation`] with one line per violated rule.
pub fn load_from_str(content: &str, source_name: &str) -> Result<ClassifierConfig, ConfigError> {
    let config: ClassifierConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })?;

    validation::validate(&config).map_err(|errors| {
        ConfigError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::WireFormat;
    use std::io::Write;

    const VALID_TOML: &str = r#"
[cache]
ttl_ms = 600000
max_entries = 200

[rate_limit]
window_ms = 30000
quota = 5

[providers.primary]
name = "detector"
url = "http://localhost:8000/api/detect-emotion"
batch_url = "http://localhost:8000/api/batch-detect-emotion"
timeout_ms = 3000

[providers.secondary]
url = "https://api-inference.example/models/emotion"
api_key_env = "EMOTION_SECONDARY_TOKEN"
format = "label_scores"
"#;

    #[test]
    fn test_load_from_str_valid_toml_succeeds() {
        let config = load_from_str(VALID_TOML, "test").expect("test: valid config");
        assert_eq!(config.cache.max_entries, 200);
        assert_eq!(config.rate_limit.quota, 5);
        let primary = config.providers.primary.expect("test: primary present");
        assert_eq!(primary.name.as_deref(), Some("detector"));
        assert_eq!(primary.format, WireFormat::Flat);
        let secondary = config.providers.secondary.expect("test: secondary present");
        assert_eq!(secondary.format, WireFormat::LabelScores);
        assert_eq!(secondary.timeout_ms, None);
    }

    #[test]
    fn test_load_from_str_empty_uses_defaults() {
        let config = load_from_str("", "empty.toml").expect("test: empty config");
        assert_eq!(config, ClassifierConfig::default());
    }

    #[test]
    fn test_load_from_str_partial_section_keeps_other_defaults() {
        let config = load_from_str("[cache]\nttl_ms = 5\n", "partial.toml")
            .expect("test: partial config");
        assert_eq!(config.cache.ttl_ms, 5);
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.health.cooldown_ms, 120_000);
    }

    #[test]
    fn test_load_from_str_invalid_toml_returns_parse_error() {
        let result = load_from_str("not valid toml [[[", "bad.toml");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_from_str_validation_failure_returns_validation_error() {
        let toml_str = r#"
[rate_limit]
quota = 0

[lexicon]
confidence_cap = 2.0
"#;
        let err = load_from_str(toml_str, "zero-quota.toml").unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(msg.contains("rate_limit.quota"));
        assert!(msg.contains("lexicon.confidence_cap"));
    }

    #[test]
    fn test_load_from_str_unknown_format_fails() {
        let toml_str = r#"
[providers.primary]
url = "http://localhost:8000"
format = "xml"
"#;
        let result = load_from_str(toml_str, "format.toml");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_from_str_chat_completion_provider() {
        let toml_str = r#"
[providers.secondary]
name = "openrouter"
url = "https://openrouter.ai/api/v1/chat/completions"
api_key_env = "OPENROUTER_API_KEY"
format = "chat_completion"
model = "qwen/qwen2.5-72b-instruct"
"#;
        let config = load_from_str(toml_str, "chat.toml").expect("test: chat config");
        let secondary = config.providers.secondary.expect("test: secondary present");
        assert_eq!(secondary.format, WireFormat::ChatCompletion);
        assert_eq!(secondary.model.as_deref(), Some("qwen/qwen2.5-72b-instruct"));
    }

    #[test]
    fn test_load_from_str_provider_without_url_fails() {
        let result = load_from_str("[providers.primary]\ntimeout_ms = 10\n", "nourl.toml");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_from_str_source_name_appears_in_error() {
        let err = load_from_str("invalid [[[", "my-source.toml").unwrap_err();
        assert!(err.to_string().contains("my-source.toml"));
    }

    #[test]
    fn test_load_from_file_valid_toml_succeeds() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("emotion.toml");
        let mut f = std::fs::File::create(&path).expect("test: create file");
        f.write_all(VALID_TOML.as_bytes()).expect("test: write");
        drop(f);

        let config = load_from_file(&path).expect("test: load from file");
        assert_eq!(config.rate_limit.window_ms, 30_000);
    }

    #[test]
    fn test_load_from_file_missing_file_returns_io_error() {
        let result = load_from_file(Path::new("/nonexistent/path/emotion.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_from_file_invalid_values_returns_validation_error() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "[providers.primary]\nurl = \"localhost\"\n").expect("test: write");

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
