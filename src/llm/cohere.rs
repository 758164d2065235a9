//! Cohere `generate` binding.

use super::{
    base_url, check_status, decode_json, http_client, non_empty, require_key, transport_error,
    CompletionRequest, LlmBackend,
};
use crate::config::LlmConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const PROVIDER: &str = "cohere";
pub const DEFAULT_MODEL: &str = "command-light";
pub const DEFAULT_BASE_URL: &str = "https://api.cohere.ai/v1";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    max_tokens: usize,
    temperature: f32,
    k: u32,
    return_likelihoods: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Deserialize)]
struct Generation {
    #[serde(default)]
    text: Option<String>,
}

pub struct CohereBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl CohereBackend {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = require_key(config, "COHERE_API_KEY")?;
        Ok(Self {
            client: http_client(PROVIDER, config.timeout())?,
            base_url: base_url(config, DEFAULT_BASE_URL),
            api_key,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: config.timeout(),
        })
    }
}

/// `generate` takes a single prompt, so a system instruction is prepended.
fn flatten_prompt(request: &CompletionRequest) -> String {
    match request.system.as_deref() {
        Some(system) if !system.trim().is_empty() => format!("{}\n\n{}", system.trim(), request.prompt),
        _ => request.prompt.clone(),
    }
}

#[async_trait]
impl LlmBackend for CohereBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: flatten_prompt(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            k: 0,
            return_likelihoods: "NONE",
        };

        debug!("cohere: {} prompt chars, max_tokens={}", body.prompt.len(), body.max_tokens);
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout, e))?;
        let response = check_status(PROVIDER, response).await?;

        let parsed: GenerateResponse = decode_json(PROVIDER, self.timeout, response).await?;
        let text = parsed.generations.into_iter().next().and_then(|g| g.text);
        non_empty(PROVIDER, text)
    }
}
