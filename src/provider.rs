//! Provider abstraction and the remote HTTP adapter.
//!
//! Every remote step of the fallback chain is an [`EmotionProvider`]: the
//! primary classification service and any secondary model providers answer
//! `classify(text) -> Result<Classification, _>`. The orchestrator iterates
//! an ordered list of them, then ends at the local lexicon, which cannot fail
//! and so is called directly.
//!
//! Remote services disagree on JSON shape. [`RemoteProvider`] normalizes both
//! supported shapes into a [`Classification`] at this boundary so nothing
//! past it sees wire-format variance.
//!
//! ## Wire formats
//!
//! - [`WireFormat::Flat`]: `POST {"text": ...}` answers
//!   `{"emotion", "confidence", "model_used"}`; the batch endpoint takes
//!   `{"texts": [...]}` and answers `{"results": [...], "total_time"}`.
//! - [`WireFormat::LabelScores`]: `POST {"inputs": ...}` answers
//!   `[[{"label", "score"}, ...]]`; the top-scoring label wins.
//! - [`WireFormat::ChatCompletion`]: an OpenAI-style chat endpoint is asked
//!   for a JSON object `{"emotion", "confidence"}` in
//!   `choices[0].message.content`. No batch call.
//!
//! ## Environment Variables
//!
//! A provider's bearer token is read from the variable named by
//! `api_key_env` in its config section, if any.

use crate::config::ProviderConfig;
use crate::{Classification, ClassifierError, Emotion};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// A single step in the fallback chain.
///
/// Implementations must be thread-safe (Send + Sync); the orchestrator holds
/// them as `Arc<dyn EmotionProvider>`.
#[async_trait]
pub trait EmotionProvider: Send + Sync {
    /// Name reported in `provider_used` and in logs and metrics.
    fn name(&self) -> &str;

    /// Classify one text.
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;

    /// Whether [`classify_batch`](Self::classify_batch) can succeed. The
    /// batch coordinator skips providers that return `false`.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Classify several texts in one call. The result must have the same
    /// length and order as `texts`.
    ///
    /// The default reports batch calls as unsupported, which makes the
    /// batch coordinator fall back to per-item classification.
    async fn classify_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Classification>, ClassifierError> {
        let _ = texts;
        Err(ClassifierError::ProviderError {
            provider: self.name().to_string(),
            message: "batch classification unsupported".to_string(),
        })
    }
}

/// Which remote slot a provider fills. Decides its default name and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderRole {
    /// Primary classification service, guarded by the health tracker.
    Primary,
    /// Secondary model provider.
    Secondary,
}

impl ProviderRole {
    /// Lowercase role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderRole::Primary => "primary",
            ProviderRole::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON shape spoken by a remote endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// `{text}` → `{emotion, confidence, model_used}`.
    #[default]
    Flat,
    /// `{inputs}` → `[[{label, score}]]`.
    LabelScores,
    /// `{model, messages}` → `{choices: [{message: {content}}]}`, where the
    /// content is a JSON `{emotion, confidence}` object.
    ChatCompletion,
}

/// Model requested from a chat-completion endpoint when none is configured.
pub const DEFAULT_CHAT_MODEL: &str = "qwen/qwen2.5-72b-instruct";

const CHAT_SYSTEM_PROMPT: &str = "You are an emotion classifier. Identify the primary \
emotion expressed in the user's text. Reply with a JSON object with two fields: emotion \
(one of joy, sadness, anger, fear, surprise, love, neutral) and confidence (a number \
between 0 and 1).";
const CHAT_MAX_TOKENS: u32 = 100;
const CHAT_TEMPERATURE: f32 = 0.1;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct FlatRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct FlatBatchRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct FlatResponse {
    emotion: String,
    confidence: f64,
    #[serde(default)]
    model_used: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatBatchResponse {
    results: Vec<FlatResponse>,
    #[serde(default)]
    total_time: Option<f64>,
}

#[derive(Debug, Serialize)]
struct InputsRequest<'a, T: ?Sized> {
    inputs: &'a T,
}

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Hosted inference endpoints answer either one list per input or, with
/// `top_k = 1`, a single flat list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LabelScoresBody {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// The JSON object the model is asked to reply with.
#[derive(Debug, Deserialize)]
struct ChatVerdict {
    emotion: String,
    #[serde(default = "default_verdict_confidence")]
    confidence: f64,
}

fn default_verdict_confidence() -> f64 {
    0.5
}

/// Models sometimes wrap JSON replies in a markdown code fence.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn top_label(scores: &[LabelScore]) -> Option<&LabelScore> {
    scores
        .iter()
        .filter(|s| !s.score.is_nan())
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

// ============================================================================
// Remote provider
// ============================================================================

/// HTTP adapter for a remote classification endpoint.
///
/// ## Example
///
/// ```no_run
/// use tokio_emotion_orchestrator::{ProviderRole, RemoteProvider, WireFormat};
/// use std::time::Duration;
///
/// let primary = RemoteProvider::new("primary", "http://localhost:8000/api/detect-emotion", ProviderRole::Primary)
///     .with_batch_url("http://localhost:8000/api/batch-detect-emotion")
///     .with_timeout(Duration::from_secs(4));
///
/// let secondary = RemoteProvider::new("hosted", "https://inference.example/models/emotion", ProviderRole::Secondary)
///     .with_format(WireFormat::LabelScores)
///     .with_api_key("token");
///
/// let chat = RemoteProvider::new("openrouter", "https://openrouter.ai/api/v1/chat/completions", ProviderRole::Secondary)
///     .with_format(WireFormat::ChatCompletion)
///     .with_model("qwen/qwen2.5-72b-instruct")
///     .with_api_key("token");
/// ```
#[derive(Clone)]
pub struct RemoteProvider {
    client: reqwest::Client,
    name: String,
    url: String,
    batch_url: Option<String>,
    api_key: Option<String>,
    format: WireFormat,
    model: String,
    timeout: Duration,
    role: ProviderRole,
}

impl fmt::Debug for RemoteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProvider")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("batch_url", &self.batch_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("format", &self.format)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("role", &self.role)
            .finish()
    }
}

impl RemoteProvider {
    /// Create an adapter with the flat wire format and the role's default
    /// timeout.
    pub fn new(name: impl Into<String>, url: impl Into<String>, role: ProviderRole) -> Self {
        let timeout = match role {
            ProviderRole::Primary => Duration::from_secs(4),
            ProviderRole::Secondary => Duration::from_secs(12),
        };
        Self {
            client: reqwest::Client::new(),
            name: name.into(),
            url: url.into(),
            batch_url: None,
            api_key: None,
            format: WireFormat::Flat,
            model: DEFAULT_CHAT_MODEL.to_string(),
            timeout,
            role,
        }
    }

    /// Build an adapter from a `[providers.primary]` or
    /// `[providers.secondary]` section.
    ///
    /// A configured `api_key_env` that is unset is logged and the adapter
    /// runs without credentials.
    pub fn from_config(config: &ProviderConfig, role: ProviderRole) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| role.as_str().to_string());
        let timeout = match role {
            ProviderRole::Primary => config.primary_timeout(),
            ProviderRole::Secondary => config.secondary_timeout(),
        };

        let mut provider = Self::new(name, config.url.clone(), role)
            .with_format(config.format)
            .with_timeout(timeout);
        if let Some(batch_url) = &config.batch_url {
            provider = provider.with_batch_url(batch_url.clone());
        }
        if let Some(model) = &config.model {
            provider = provider.with_model(model.clone());
        }
        if let Some(var) = &config.api_key_env {
            match std::env::var(var) {
                Ok(key) if !key.is_empty() => provider = provider.with_api_key(key),
                _ => warn!(
                    provider = %provider.name,
                    env = %var,
                    "api key variable not set; calling without credentials"
                ),
            }
        }
        provider
    }

    /// Set the batch endpoint.
    pub fn with_batch_url(mut self, url: impl Into<String>) -> Self {
        self.batch_url = Some(url.into());
        self
    }

    /// Send `Authorization: Bearer <key>` on every call.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the wire format.
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Model requested from a chat-completion endpoint.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a shared `reqwest::Client`.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The slot this adapter was built for.
    pub fn role(&self) -> ProviderRole {
        self.role
    }

    fn request_error(&self, e: reqwest::Error) -> ClassifierError {
        if e.is_timeout() {
            ClassifierError::ProviderTimeout {
                provider: self.name.clone(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            ClassifierError::ProviderError {
                provider: self.name.clone(),
                message: format!("request failed: {e}"),
            }
        }
    }

    fn malformed(&self, detail: impl fmt::Display) -> ClassifierError {
        ClassifierError::ProviderError {
            provider: self.name.clone(),
            message: format!("malformed response: {detail}"),
        }
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, ClassifierError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ProviderError {
                provider: self.name.clone(),
                message: format!("HTTP {}: {}", status, error_text),
            });
        }

        response.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(e)
            } else {
                self.malformed(e)
            }
        })
    }

    fn flat_to_classification(&self, response: FlatResponse) -> Classification {
        if let Some(model) = &response.model_used {
            debug!(provider = %self.name, model = %model, "remote classification");
        }
        Classification::new(
            Emotion::from_label(&response.emotion),
            response.confidence,
            self.name.clone(),
        )
    }

    fn chat_to_classification(
        &self,
        response: ChatResponse,
    ) -> Result<Classification, ClassifierError> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| self.malformed("no choices in chat response"))?;
        let verdict: ChatVerdict = serde_json::from_str(strip_code_fence(&content))
            .map_err(|e| self.malformed(format!("chat content is not an emotion object: {e}")))?;
        if let Some(model) = &response.model {
            debug!(provider = %self.name, model = %model, "remote classification");
        }
        Ok(Classification::new(
            Emotion::from_label(&verdict.emotion),
            verdict.confidence,
            self.name.clone(),
        ))
    }

    fn scores_to_classification(
        &self,
        scores: &[LabelScore],
    ) -> Result<Classification, ClassifierError> {
        let top = top_label(scores).ok_or_else(|| self.malformed("no label scores"))?;
        Ok(Classification::new(
            Emotion::from_label(&top.label),
            top.score,
            self.name.clone(),
        ))
    }
}

#[async_trait]
impl EmotionProvider for RemoteProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_batch(&self) -> bool {
        match self.format {
            WireFormat::Flat => self.batch_url.is_some(),
            WireFormat::LabelScores => true,
            WireFormat::ChatCompletion => false,
        }
    }

    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        match self.format {
            WireFormat::Flat => {
                let response: FlatResponse = self.post(&self.url, &FlatRequest { text }).await?;
                Ok(self.flat_to_classification(response))
            }
            WireFormat::LabelScores => {
                let body: LabelScoresBody =
                    self.post(&self.url, &InputsRequest { inputs: text }).await?;
                match body {
                    LabelScoresBody::Nested(lists) => {
                        let first = lists
                            .first()
                            .ok_or_else(|| self.malformed("empty result list"))?;
                        self.scores_to_classification(first)
                    }
                    LabelScoresBody::Flat(scores) => self.scores_to_classification(&scores),
                }
            }
            WireFormat::ChatCompletion => {
                let request = ChatRequest {
                    model: &self.model,
                    messages: [
                        ChatMessage {
                            role: "system",
                            content: CHAT_SYSTEM_PROMPT,
                        },
                        ChatMessage {
                            role: "user",
                            content: text,
                        },
                    ],
                    max_tokens: CHAT_MAX_TOKENS,
                    temperature: CHAT_TEMPERATURE,
                    response_format: ResponseFormat {
                        kind: "json_object",
                    },
                };
                let response: ChatResponse = self.post(&self.url, &request).await?;
                self.chat_to_classification(response)
            }
        }
    }

    async fn classify_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Classification>, ClassifierError> {
        let results = match self.format {
            WireFormat::ChatCompletion => {
                return Err(ClassifierError::ProviderError {
                    provider: self.name.clone(),
                    message: "batch classification unsupported".to_string(),
                });
            }
            WireFormat::Flat => {
                let Some(batch_url) = &self.batch_url else {
                    return Err(ClassifierError::ProviderError {
                        provider: self.name.clone(),
                        message: "batch classification unsupported".to_string(),
                    });
                };
                let response: FlatBatchResponse =
                    self.post(batch_url, &FlatBatchRequest { texts }).await?;
                if let Some(total) = response.total_time {
                    debug!(provider = %self.name, total_time = total, count = texts.len(), "remote batch");
                }
                response
                    .results
                    .into_iter()
                    .map(|r| self.flat_to_classification(r))
                    .collect::<Vec<_>>()
            }
            WireFormat::LabelScores => {
                let url = self.batch_url.as_deref().unwrap_or(&self.url);
                let body: LabelScoresBody =
                    self.post(url, &InputsRequest { inputs: texts }).await?;
                match body {
                    LabelScoresBody::Nested(lists) => lists
                        .iter()
                        .map(|scores| self.scores_to_classification(scores))
                        .collect::<Result<Vec<_>, _>>()?,
                    // One top label per input.
                    LabelScoresBody::Flat(scores) => scores
                        .into_iter()
                        .map(|s| {
                            Classification::new(
                                Emotion::from_label(&s.label),
                                s.score,
                                self.name.clone(),
                            )
                        })
                        .collect(),
                }
            }
        };

        if results.len() != texts.len() {
            return Err(self.malformed(format!(
                "expected {} results, got {}",
                texts.len(),
                results.len()
            )));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(label: &str, score: f64) -> LabelScore {
        LabelScore {
            label: label.into(),
            score,
        }
    }

    #[test]
    fn test_top_label_picks_highest_score() {
        let scores = vec![score("sadness", 0.1), score("joy", 0.7), score("fear", 0.2)];
        assert_eq!(top_label(&scores).map(|s| s.label.as_str()), Some("joy"));
    }

    #[test]
    fn test_top_label_ignores_nan_and_empty() {
        assert!(top_label(&[]).is_none());
        let scores = vec![score("joy", f64::NAN), score("anger", 0.4)];
        assert_eq!(top_label(&scores).map(|s| s.label.as_str()), Some("anger"));
    }

    #[test]
    fn test_label_scores_body_accepts_both_shapes() {
        let nested: LabelScoresBody =
            serde_json::from_str(r#"[[{"label":"joy","score":0.9}]]"#).expect("test: nested");
        assert!(matches!(nested, LabelScoresBody::Nested(ref l) if l.len() == 1));

        let flat: LabelScoresBody =
            serde_json::from_str(r#"[{"label":"joy","score":0.9}]"#).expect("test: flat");
        assert!(matches!(flat, LabelScoresBody::Flat(ref l) if l.len() == 1));
    }

    #[test]
    fn test_flat_response_maps_label_and_tags_provider() {
        let provider = RemoteProvider::new("detector", "http://localhost", ProviderRole::Primary);
        let c = provider.flat_to_classification(FlatResponse {
            emotion: "Happy".into(),
            confidence: 1.4,
            model_used: None,
        });
        assert_eq!(c.emotion(), Emotion::Joy);
        assert_eq!(c.confidence(), 1.0);
        assert_eq!(c.provider_used(), "detector");
    }

    #[test]
    fn test_role_default_timeouts() {
        let primary = RemoteProvider::new("p", "http://x", ProviderRole::Primary);
        let secondary = RemoteProvider::new("s", "http://x", ProviderRole::Secondary);
        assert_eq!(primary.timeout(), Duration::from_secs(4));
        assert_eq!(secondary.timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_from_config_defaults_name_to_role() {
        let config = ProviderConfig {
            name: None,
            url: "http://localhost:9000".into(),
            batch_url: None,
            api_key_env: Some("EMOTION_TEST_UNSET_KEY_VAR".into()),
            format: WireFormat::LabelScores,
            timeout_ms: Some(750),
            model: None,
        };
        let provider = RemoteProvider::from_config(&config, ProviderRole::Secondary);
        assert_eq!(provider.name(), "secondary");
        assert_eq!(provider.role(), ProviderRole::Secondary);
        assert_eq!(provider.timeout(), Duration::from_millis(750));
        assert!(provider.api_key.is_none());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let provider =
            RemoteProvider::new("p", "http://x", ProviderRole::Primary).with_api_key("secret");
        let text = format!("{provider:?}");
        assert!(!text.contains("secret"));
        assert!(text.contains("has_api_key: true"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence(" {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn test_chat_response_maps_label_and_defaults_confidence() {
        let provider = RemoteProvider::new("chat", "http://x", ProviderRole::Secondary)
            .with_format(WireFormat::ChatCompletion);
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"{\"emotion\":\"Furious\"}"}}]}"#,
        )
        .expect("test: chat response");
        let c = provider
            .chat_to_classification(response)
            .expect("test: classification");
        assert_eq!(c.emotion(), Emotion::Anger);
        assert_eq!(c.confidence(), 0.5);
        assert_eq!(c.provider_used(), "chat");
        assert!(!provider.supports_batch());
    }

    #[test]
    fn test_chat_response_without_choices_is_malformed() {
        let provider = RemoteProvider::new("chat", "http://x", ProviderRole::Secondary)
            .with_format(WireFormat::ChatCompletion);
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[]}"#).expect("test: chat response");
        let err = provider.chat_to_classification(response).unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }
}
