//! Text normalization.
//!
//! Turns raw text into the [`NormalizedKey`] shared by the cache, the rate
//! limiter and the in-flight registry. Equality is deliberately lossy: texts
//! that differ only in case, surrounding or repeated whitespace, or in
//! characters past the length cap are the same key.

use std::fmt;

/// Default maximum key length, in characters.
pub const DEFAULT_MAX_KEY_CHARS: usize = 100;

/// Canonical identity of a text for caching, rate limiting and dedup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// The reserved key every empty or whitespace-only text maps to.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Whether this is the reserved empty-input key.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize with the default length cap of [`DEFAULT_MAX_KEY_CHARS`].
///
/// # Example
///
/// ```rust
/// use tokio_emotion_orchestrator::normalize;
/// let a = normalize("  I am   SO happy\t");
/// let b = normalize("i am so happy");
/// assert_eq!(a, b);
/// ```
pub fn normalize(text: &str) -> NormalizedKey {
    normalize_with_limit(text, DEFAULT_MAX_KEY_CHARS)
}

/// Trim, lowercase, collapse whitespace runs to one space, then keep at most
/// `max_chars` characters.
///
/// Truncation counts characters, not bytes, so multi-byte text is never cut
/// mid-codepoint. A truncation that ends on the collapsed space drops it.
pub fn normalize_with_limit(text: &str, max_chars: usize) -> NormalizedKey {
    let collapsed = text
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let truncated: String = collapsed.chars().take(max_chars).collect();
    NormalizedKey(truncated.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Hello World  ").as_str(), "hello world");
    }

    #[test]
    fn test_normalize_collapses_internal_whitespace() {
        assert_eq!(normalize("a \t\n  b   c").as_str(), "a b c");
    }

    #[test]
    fn test_normalize_empty_and_whitespace_map_to_reserved_key() {
        assert!(normalize("").is_empty());
        assert!(normalize(" \t\n ").is_empty());
        assert_eq!(normalize("   "), NormalizedKey::empty());
    }

    #[test]
    fn test_normalize_truncates_to_cap() {
        let long = "x".repeat(250);
        assert_eq!(normalize(&long).as_str().chars().count(), DEFAULT_MAX_KEY_CHARS);
    }

    #[test]
    fn test_texts_differing_beyond_cap_share_a_key() {
        let prefix = "a".repeat(DEFAULT_MAX_KEY_CHARS);
        let one = format!("{prefix} first ending");
        let two = format!("{prefix} a completely different ending");
        assert_eq!(normalize(&one), normalize(&two));
    }

    #[test]
    fn test_normalize_counts_chars_not_bytes() {
        let text = "é".repeat(10);
        let key = normalize_with_limit(&text, 4);
        assert_eq!(key.as_str(), "éééé");
    }

    #[test]
    fn test_truncation_does_not_leave_trailing_space() {
        let key = normalize_with_limit("abc def", 4);
        assert_eq!(key.as_str(), "abc");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("  Mixed   CASE text ");
        let twice = normalize(once.as_str());
        assert_eq!(once, twice);
    }
}
