//! Remote embedding provider client.
//!
//! One vector per request from a fixed model, under a hard deadline that
//! aborts the in-flight call. Rate-limit responses surface the provider's
//! retry hint instead of auto-retrying; there is no retry anywhere in this
//! client.

use hive_core::config::{EngineConfig, API_KEY_ENV};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("semantic search unavailable: no provider credential (set {API_KEY_ENV})")]
    NotConfigured,

    #[error("embedding request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("embedding provider rate limited, retry after: {}", .retry_after.as_deref().unwrap_or("unspecified"))]
    RateLimited { retry_after: Option<String> },

    #[error("embedding provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider response contained no embedding")]
    EmptyResponse,

    #[error("embedding length mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// HTTP client for the embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl EmbeddingClient {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            api_key: config.api_key.clone(),
            timeout: config.embed_timeout(),
        }
    }

    /// True when a credential is present and requests can be attempted.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request one embedding vector for `text`.
    ///
    /// The whole exchange (connect, send, read body) runs under the
    /// configured deadline; on expiry the in-flight call is dropped and a
    /// `Timeout` is returned.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let Some(api_key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(EmbeddingError::NotConfigured);
        };

        let url = format!("{}/v1/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };

        let exchange = async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                return Err(EmbeddingError::RateLimited { retry_after });
            }

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(EmbeddingError::Provider { status, message });
            }

            let body: EmbedResponse = response.json().await?;
            body.data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or(EmbeddingError::EmptyResponse)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => {
                if let Ok(vector) = &result {
                    debug!(dims = vector.len(), "embedding received");
                }
                result
            }
            Err(_) => Err(EmbeddingError::Timeout {
                elapsed_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
