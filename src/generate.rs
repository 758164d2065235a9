//! Direct AI text generation, one-shot or streamed.
//!
//! Unlike the summarizer there is no fallback here: provider failures are
//! returned to the caller as [`PdfToolsError::Provider`].

use crate::error::PdfToolsError;
use crate::llm::{CompletionRequest, LlmBackend};
use crate::stream::{relay_stream, TokenStream};
use tracing::debug;

/// Temperature used when the caller does not pick one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Output budget used when the caller does not pick one.
pub const DEFAULT_MAX_TOKENS: usize = 1024;

/// A generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    fn to_completion(&self) -> Result<CompletionRequest, PdfToolsError> {
        if self.prompt.trim().is_empty() {
            return Err(PdfToolsError::MissingParameter { name: "prompt" });
        }
        if self.max_tokens == 0 {
            return Err(PdfToolsError::InvalidConfig("Max tokens must be ≥ 1".into()));
        }
        let mut request = CompletionRequest::new(self.prompt.clone(), self.max_tokens, self.temperature);
        if let Some(system) = self.system.as_deref().filter(|s| !s.trim().is_empty()) {
            request = request.with_system(system);
        }
        Ok(request)
    }
}

/// Generate a complete answer.
pub async fn generate(backend: &dyn LlmBackend, request: &GenerateRequest) -> Result<String, PdfToolsError> {
    let completion = request.to_completion()?;
    debug!("generate: {} prompt chars via {}/{}", request.prompt.len(), backend.name(), backend.model());
    Ok(backend.complete(&completion).await?)
}

/// Start a streamed answer; tokens arrive in order through the relay.
pub async fn generate_stream(
    backend: &dyn LlmBackend,
    request: &GenerateRequest,
) -> Result<TokenStream, PdfToolsError> {
    let completion = request.to_completion()?;
    let body = backend.stream(&completion).await?;
    Ok(relay_stream(body))
}
