//! LLM backend adapter: one completion contract over several providers.
//!
//! ```text
//! LlmConfig.provider ─┬─ "deepseek" → DeepSeekBackend   (native HTTP, streaming)
//!                     ├─ "cohere"   → CohereBackend     (native HTTP)
//!                     └─ anything   → EdgequakeBackend  (edgequake-llm ProviderFactory)
//! ```
//!
//! The backend is chosen once by [`resolve_backend`]. Backends never retry;
//! the summarizer falls back to its offline path and direct generation
//! surfaces the error.

pub mod cohere;
pub mod deepseek;
pub mod edgequake;

pub use cohere::CohereBackend;
pub use deepseek::DeepSeekBackend;
pub use edgequake::EdgequakeBackend;

use crate::config::LlmConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Raw streaming response body, before SSE decoding.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ProviderError>> + Send>>;

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: usize, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens,
            temperature,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// A provider able to turn a prompt into text.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name, e.g. `deepseek`.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Generate text. Empty output is [`ProviderError::EmptyResponse`].
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// Start a streaming completion and return the raw SSE body.
    async fn stream(&self, request: &CompletionRequest) -> Result<ByteStream, ProviderError> {
        let _ = request;
        Err(ProviderError::StreamingUnsupported {
            provider: self.name().to_string(),
        })
    }
}

/// Build the backend named by `config.provider`.
pub fn resolve_backend(config: &LlmConfig) -> Result<Arc<dyn LlmBackend>, ProviderError> {
    match config.provider.as_str() {
        deepseek::PROVIDER => Ok(Arc::new(DeepSeekBackend::from_config(config)?)),
        cohere::PROVIDER => Ok(Arc::new(CohereBackend::from_config(config)?)),
        _ => Ok(Arc::new(EdgequakeBackend::from_config(config)?)),
    }
}

// ── Shared HTTP plumbing ─────────────────────────────────────────────────

pub(crate) fn http_client(provider: &str, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Transport {
            provider: provider.to_string(),
            detail: e.to_string(),
        })
}

pub(crate) fn require_key(config: &LlmConfig, env_hint: &str) -> Result<String, ProviderError> {
    config.api_key.clone().ok_or_else(|| ProviderError::NotConfigured {
        provider: config.provider.clone(),
        hint: format!("Set {env_hint} or pass --api-key."),
    })
}

pub(crate) fn transport_error(provider: &str, timeout: Duration, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            secs: timeout.as_secs(),
        }
    } else {
        ProviderError::Transport {
            provider: provider.to_string(),
            detail: e.to_string(),
        }
    }
}

/// Map a non-2xx response onto the error taxonomy; pass 2xx through.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(500).collect();

    Err(match status.as_u16() {
        401 | 403 => ProviderError::Auth {
            provider: provider.to_string(),
            detail: body,
        },
        429 => ProviderError::RateLimited {
            provider: provider.to_string(),
            retry_after_secs,
        },
        code => ProviderError::Status {
            provider: provider.to_string(),
            status: code,
            body,
        },
    })
}

/// Read and decode a JSON body, reporting decode failures as malformed.
pub(crate) async fn decode_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    timeout: Duration,
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let text = response
        .text()
        .await
        .map_err(|e| transport_error(provider, timeout, e))?;
    serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse {
        provider: provider.to_string(),
        detail: e.to_string(),
    })
}

pub(crate) fn non_empty(provider: &str, text: Option<String>) -> Result<String, ProviderError> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t.trim().to_string()),
        _ => Err(ProviderError::EmptyResponse {
            provider: provider.to_string(),
        }),
    }
}

fn base_url(config: &LlmConfig, default: &str) -> String {
    config
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
