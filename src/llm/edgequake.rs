//! Every other provider, through `edgequake-llm`.
//!
//! The provider is built with [`ProviderFactory::create_llm_provider`], which
//! reads the provider's own API key variable (`OPENAI_API_KEY`,
//! `ANTHROPIC_API_KEY`, …). The name `auto` picks the first provider found
//! by [`ProviderFactory::from_env`].

use super::{non_empty, CompletionRequest, LlmBackend};
use crate::config::LlmConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

pub struct EdgequakeBackend {
    provider: Arc<dyn LLMProvider>,
    name: String,
    model: String,
    timeout: Duration,
}

impl EdgequakeBackend {
    /// Wrap a pre-built provider.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        name: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let model = config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let provider = if config.provider == "auto" {
            let (llm, _embedding) = ProviderFactory::from_env().map_err(|e| ProviderError::NotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pick --provider.\n\
                    Error: {e}"
                ),
            })?;
            llm
        } else {
            ProviderFactory::create_llm_provider(&config.provider, &model).map_err(|e| {
                ProviderError::NotConfigured {
                    provider: config.provider.clone(),
                    hint: format!("{e}"),
                }
            })?
        };

        Ok(Self::new(provider, config.provider.clone(), model, config.timeout()))
    }
}

#[async_trait]
impl LlmBackend for EdgequakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user_with_images(request.prompt.as_str(), Vec::new()));

        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&options)))
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: self.name.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| ProviderError::Upstream {
                provider: self.name.clone(),
                message: format!("{e}"),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );
        non_empty(&self.name, Some(response.content))
    }
}
