//! Embedding providers backed by remote APIs.
//!
//! Concrete implementations of [`EmbeddingProvider`]:
//! - [`DisabledProvider`] — fails every call; used when embeddings are
//!   not configured.
//! - [`OpenAiProvider`] — calls the OpenAI embeddings endpoint with
//!   retry and exponential backoff.
//!
//! # Retry Strategy
//!
//! Transient failures are retried with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use docvault_core::embedding::EmbeddingProvider;
use docvault_core::error::EmbedError;

use crate::config::EmbeddingConfig;

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// A no-op provider that rejects every embedding request.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Disabled)
    }
}

/// Provider calling `POST /v1/embeddings` on the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable at construction
/// time. Batches are sent as a single request; response vectors are
/// checked against the configured dimensionality before they are
/// returned.
pub struct OpenAiProvider {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .context("embedding.model required for the openai provider")?;
        let dims = config
            .dims
            .context("embedding.dims required for the openai provider")?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_key,
            client,
            max_retries: config.max_retries,
        })
    }

    async fn request_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(attempt, delay_secs = delay.as_secs(), "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| EmbedError::Malformed(e.to_string()))?;
                        return self.parse_response(&json, texts.len());
                    }

                    // Rate limited or server error, worth another attempt.
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(EmbedError::Provider(format!("{status}: {body_text}")));
                        continue;
                    }

                    // Any other client error is not retryable.
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(EmbedError::Provider(format!("{status}: {body_text}")));
                }
                Err(e) => {
                    last_err = Some(EmbedError::Provider(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EmbedError::Provider("embedding failed after retries".into())))
    }

    fn parse_response(
        &self,
        json: &serde_json::Value,
        expected: usize,
    ) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| EmbedError::Malformed("missing data array".into()))?;

        if data.len() != expected {
            return Err(EmbedError::Malformed(format!(
                "expected {expected} embeddings, got {}",
                data.len()
            )));
        }

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| EmbedError::Malformed("missing embedding field".into()))?;

            let vec: Vec<f32> = embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();

            if vec.len() != self.dims {
                return Err(EmbedError::Malformed(format!(
                    "expected {} dims, got {}",
                    self.dims,
                    vec.len()
                )));
            }

            embeddings.push(vec);
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch = texts.len(), "requesting embeddings");
        self.request_batch(texts).await
    }
}

/// Instantiate the provider named by the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
