use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::error;

use crate::config::CoreConfig;
use crate::error::FlowError;
use crate::model::{MediaPayload, ModelInvoker, ModelRequest, ModelResponse};

/// `GeminiInvoker` calls the hosted Gemini `generateContent` API and
/// normalizes the reply into a `ModelResponse`. It is a thin transport:
/// one synchronous round trip, no retries, no judgement about whether the
/// content is usable.
pub struct GeminiInvoker {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiInvoker {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl ModelInvoker for GeminiInvoker {
    #[tracing::instrument(name = "gemini_invoke", skip(self, request), fields(model = %request.model_id))]
    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, FlowError> {
        let body = request_body(&request);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            request.model_id
        );

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FlowError::Provider(format!("Gemini request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".into());
            error!("Gemini error ({}): {}", status, text);
            return Err(FlowError::Provider(format!(
                "Gemini API returned {status}: {text}"
            )));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| FlowError::Provider(format!("invalid Gemini response: {e}")))?;

        parse_response(&payload)
    }
}

fn request_body(request: &ModelRequest) -> Value {
    let mut generation_config = serde_json::Map::new();
    generation_config.insert(
        "responseModalities".into(),
        json!(request.modalities),
    );

    if let Some(config) = &request.config {
        if let Some(schema) = &config.response_schema {
            generation_config.insert("responseMimeType".into(), json!("application/json"));
            generation_config.insert("responseSchema".into(), schema.clone());
        }
        if let Some(voice) = &config.voice {
            generation_config.insert(
                "speechConfig".into(),
                json!({
                    "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": voice}}
                }),
            );
        }
    }

    json!({
        "contents": [{"parts": [{"text": request.prompt}]}],
        "generationConfig": generation_config,
    })
}

fn parse_response(payload: &Value) -> Result<ModelResponse, FlowError> {
    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| FlowError::Provider("Gemini response missing content parts".into()))?;

    let mut text_parts: Vec<&str> = Vec::new();
    let mut media = None;

    for part in parts {
        if let Some(text) = part.pointer("/text").and_then(Value::as_str) {
            text_parts.push(text);
        }
        if let Some(data) = part.pointer("/inlineData/data").and_then(Value::as_str) {
            let mime_type = part
                .pointer("/inlineData/mimeType")
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream");
            media = Some(MediaPayload {
                url: format!("data:{mime_type};base64,{data}"),
                mime_type: mime_type.to_string(),
            });
        }
    }

    Ok(ModelResponse {
        text: match text_parts.is_empty() {
            true => None,
            false => Some(text_parts.join("\n")),
        },
        media,
    })
}
