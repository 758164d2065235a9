//! DeepSeek chat-completions binding (OpenAI-compatible wire format).

use super::{
    base_url, check_status, decode_json, http_client, non_empty, require_key, transport_error,
    ByteStream, CompletionRequest, LlmBackend,
};
use crate::config::LlmConfig;
use crate::error::ProviderError;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const PROVIDER: &str = "deepseek";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct DeepSeekBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl DeepSeekBackend {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = require_key(config, "DEEPSEEK_API_KEY")?;
        Ok(Self {
            client: http_client(PROVIDER, config.timeout())?,
            base_url: base_url(config, DEFAULT_BASE_URL),
            api_key,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: config.timeout(),
        })
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        debug!(
            "deepseek: {} prompt chars, max_tokens={}, stream={}",
            request.prompt.len(),
            request.max_tokens,
            stream
        );
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, self.timeout, e))?;
        check_status(PROVIDER, response).await
    }
}

#[async_trait]
impl LlmBackend for DeepSeekBackend {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let response = self.send(request, false).await?;
        let parsed: ChatCompletionResponse = decode_json(PROVIDER, self.timeout, response).await?;
        let content = parsed.choices.into_iter().next().and_then(|c| c.message.content);
        non_empty(PROVIDER, content)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<ByteStream, ProviderError> {
        let response = self.send(request, true).await?;
        let timeout = self.timeout;
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| transport_error(PROVIDER, timeout, e)));
        Ok(Box::pin(body))
    }
}
