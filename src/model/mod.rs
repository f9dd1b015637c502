pub mod gemini;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FlowError;

/// Response kind requested from the generative provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

/// Provider-specific generation knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Voice identity for audio (text-to-speech) requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Response schema hint for structured-JSON requests. The output is
    /// still validated locally; the hint only steers the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

/// One generative call. Built per invocation and discarded after the
/// round trip.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model_id: String,
    pub modalities: Vec<Modality>,
    pub prompt: String,
    pub config: Option<GenerationConfig>,
}

impl ModelRequest {
    pub fn text(model_id: &str, prompt: String) -> Self {
        Self {
            model_id: model_id.to_string(),
            modalities: vec![Modality::Text],
            prompt,
            config: None,
        }
    }

    /// A text request whose reply must be JSON matching `schema`.
    pub fn structured(model_id: &str, prompt: String, schema: Value) -> Self {
        Self {
            model_id: model_id.to_string(),
            modalities: vec![Modality::Text],
            prompt,
            config: Some(GenerationConfig {
                response_schema: Some(schema),
                ..Default::default()
            }),
        }
    }

    pub fn image(model_id: &str, prompt: String) -> Self {
        Self {
            model_id: model_id.to_string(),
            modalities: vec![Modality::Image, Modality::Text],
            prompt,
            config: None,
        }
    }

    pub fn audio(model_id: &str, prompt: String, voice: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            modalities: vec![Modality::Audio],
            prompt,
            config: Some(GenerationConfig {
                voice: Some(voice.to_string()),
                ..Default::default()
            }),
        }
    }

    pub fn wants_structured_json(&self) -> bool {
        self.config
            .as_ref()
            .is_some_and(|c| c.response_schema.is_some())
    }
}

/// Binary media returned by the provider, normalized to a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MediaPayload {
    pub url: String,
    pub mime_type: String,
}

/// Normalized provider response. Which field is populated depends on the
/// requested modality; the orchestrator, not the invoker, decides whether
/// what came back is usable.
#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub media: Option<MediaPayload>,
}

impl ModelResponse {
    /// Non-empty text, or a `Generation` error. An empty string is a
    /// failure, not an empty success.
    pub fn require_text(&self) -> Result<&str, FlowError> {
        match self.text.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(FlowError::Generation("model returned no text".into())),
        }
    }

    /// A media payload carrying a data URI, or a `Generation` error.
    pub fn require_media(&self) -> Result<&MediaPayload, FlowError> {
        match &self.media {
            Some(media) if media.url.starts_with("data:") => Ok(media),
            Some(media) => Err(FlowError::Generation(format!(
                "model media url is not a data URI: {}",
                media.url
            ))),
            None => Err(FlowError::Generation("model returned no media".into())),
        }
    }
}

/// Uniform call surface over the generative provider: one request in, one
/// normalized response or typed error out. No internal retries; retry
/// policy belongs to callers.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, FlowError>;
}
