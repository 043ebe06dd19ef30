//! Vertex AI `:predict` text generation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TextGenerator;
use crate::config::Credentials;
use crate::error::{Result, RowflowError};
use crate::http::{HttpClient, HttpRequest};

/// Sampling parameters sent with every prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 256,
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [Instance<'a>; 1],
    parameters: GenerationParameters,
}

#[derive(Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<serde_json::Value>,
}

/// Text of a single prediction: its `content` field, or the prediction itself
/// when the model returns bare strings. Blank text counts as no completion.
fn prediction_text(prediction: serde_json::Value) -> Option<String> {
    let text = match prediction {
        serde_json::Value::String(s) => s,
        serde_json::Value::Object(mut map) => match map.remove("content") {
            Some(serde_json::Value::String(s)) => s,
            _ => return None,
        },
        _ => return None,
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Generator backed by a Vertex AI publisher model endpoint.
pub struct VertexTextGenerator<H: HttpClient> {
    http_client: Arc<H>,
    predict_url: String,
    credentials: Credentials,
    timeout_ms: u64,
    parameters: GenerationParameters,
}

impl<H: HttpClient> VertexTextGenerator<H> {
    /// `predict_url` is the full model URL ending in `:predict`.
    pub fn new(
        http_client: Arc<H>,
        predict_url: impl Into<String>,
        credentials: Credentials,
        timeout_ms: u64,
    ) -> Self {
        Self {
            http_client,
            predict_url: predict_url.into(),
            credentials,
            timeout_ms,
            parameters: GenerationParameters::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

#[async_trait]
impl<H: HttpClient> TextGenerator for VertexTextGenerator<H> {
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let body = serde_json::to_string(&PredictRequest {
            instances: [Instance { prompt }],
            parameters: self.parameters,
        })?;
        let request = HttpRequest::from_url("POST", &self.predict_url, body)?;
        let token = self.credentials.resolve()?;

        let response = self
            .http_client
            .execute(&request, &token, self.timeout_ms)
            .await
            .map_err(RowflowError::into_transport)?;

        if !response.is_success() {
            return Err(RowflowError::transport(format!(
                "predict returned HTTP {}: {}",
                response.status,
                response.body.chars().take(512).collect::<String>()
            )));
        }

        let parsed: PredictResponse =
            serde_json::from_str(&response.body).map_err(|e| RowflowError::from(e).into_transport())?;
        let count = parsed.predictions.len();
        let text = parsed.predictions.into_iter().next().and_then(prediction_text);

        match &text {
            Some(t) => tracing::info!(predictions = count, text_len = t.len(), "Completion received"),
            None => tracing::warn!(predictions = count, "Model returned no usable completion"),
        }

        Ok(text)
    }
}
