//! Error types for the edgequake-pdftools library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PdfToolsError`]: **Fatal**: the operation cannot produce a result
//!   (bad input, oversized document, no engine installed, every engine
//!   failed). Returned as `Err(PdfToolsError)` from every public entry point.
//!
//! * [`ProviderError`]: an LLM backend call failed. Nested inside
//!   [`PdfToolsError::Provider`] when it reaches the caller (direct
//!   generation, streaming), but absorbed by the summarizer, which falls back
//!   to its offline path instead.
//!
//! * [`AttemptError`]: **Non-fatal**: one engine attempt in a cascade failed
//!   (binary missing, non-zero exit, output too large) but the next candidate
//!   may still succeed. Stored inside [`crate::output::ConversionOutcome`] so
//!   callers can see why earlier tiers were skipped.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdftools library.
#[derive(Debug, Error)]
pub enum PdfToolsError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The input is structurally unusable for the requested operation.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The bytes do not start with the `%PDF` magic.
    #[error("Input is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// Document has more pages than the configured summarization limit.
    #[error("Document has {pages} pages; the limit is {max}.\nRaise it with --max-pages or MAX_PAGES.")]
    TooManyPages { pages: usize, max: usize },

    /// Document is larger than the configured byte limit.
    #[error("Input is {bytes} bytes; the limit is {max} bytes.\nRaise it with --max-mb or MAX_PDF_MB.")]
    InputTooLarge { bytes: u64, max: u64 },

    /// The PDF contains no extractable text (likely a scan without OCR).
    #[error("No extractable text found in the document (scanned PDF without OCR?)")]
    NoExtractableText,

    /// A required parameter was missing or empty.
    #[error("Missing required parameter '{name}'")]
    MissingParameter { name: &'static str },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// None of the candidate engines for the operation is installed.
    #[error("No engine available for {operation} (tried: {})\nInstall Ghostscript or QPDF, or point --gs / --qpdf at a binary.", tried.join(", "))]
    EngineUnavailable {
        operation: String,
        tried: Vec<String>,
    },

    /// Engines ran but none produced a usable artifact.
    #[error("{operation} failed: {detail}")]
    ProcessingFailure { operation: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// An LLM backend call failed and no fallback applied.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The upstream token stream broke mid-flight.
    #[error("Stream transport failed: {0}")]
    StreamTransport(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading inputs or managing the scratch directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfToolsError {
    /// `true` for errors raised before any engine or provider was invoked
    /// because the request itself was unacceptable.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. }
                | Self::InvalidInput { .. }
                | Self::NotAPdf { .. }
                | Self::TooManyPages { .. }
                | Self::InputTooLarge { .. }
                | Self::NoExtractableText
                | Self::MissingParameter { .. }
        )
    }
}

/// Failure of a single LLM backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Missing API key or unknown provider name.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    NotConfigured { provider: String, hint: String },

    /// 401/403 from the provider; retrying will not help.
    #[error("Authentication error from provider '{provider}': {detail}")]
    Auth { provider: String, detail: String },

    /// HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-2xx status.
    #[error("Provider '{provider}' returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    /// 2xx with no generated text.
    #[error("Provider '{provider}' returned an empty completion")]
    EmptyResponse { provider: String },

    /// 2xx whose body could not be decoded.
    #[error("Provider '{provider}' returned a malformed response: {detail}")]
    MalformedResponse { provider: String, detail: String },

    #[error("Provider '{provider}' timed out after {secs}s")]
    Timeout { provider: String, secs: u64 },

    #[error("Could not reach provider '{provider}': {detail}")]
    Transport { provider: String, detail: String },

    /// The backend has no streaming endpoint.
    #[error("Provider '{provider}' does not support streaming")]
    StreamingUnsupported { provider: String },

    /// Error surfaced by an `edgequake-llm` provider.
    #[error("LLM API error from '{provider}': {message}")]
    Upstream { provider: String, message: String },
}

/// A non-fatal failure of one engine attempt inside a cascade.
///
/// Stored alongside [`crate::output::ConversionOutcome`]; the cascade moves
/// on to the next candidate.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AttemptError {
    /// The engine binary could not be located.
    #[error("engine not installed")]
    NotFound,

    #[error("exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Exit status was zero but the expected output file is absent.
    #[error("no output file produced")]
    MissingOutput,

    #[error("output file is empty")]
    EmptyOutput,

    /// The artifact did not meet the candidate's acceptance threshold.
    #[error("reduction {reduction:.1}% below required {required:.1}%")]
    BelowThreshold { reduction: f64, required: f64 },

    /// The artifact is larger than the input.
    #[error("output grew from {original} to {output} bytes")]
    Grew { original: u64, output: u64 },

    #[error("I/O error: {0}")]
    Io(String),
}

impl AttemptError {
    /// `true` when the engine ran and wrote a non-empty artifact that the
    /// acceptance policy then rejected.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::BelowThreshold { .. } | Self::Grew { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_pages_display() {
        let e = PdfToolsError::TooManyPages { pages: 40, max: 15 };
        let msg = e.to_string();
        assert!(msg.contains("40 pages"), "got: {msg}");
        assert!(msg.contains("15"), "got: {msg}");
    }

    #[test]
    fn engine_unavailable_lists_candidates() {
        let e = PdfToolsError::EngineUnavailable {
            operation: "compress".into(),
            tried: vec!["gs".into(), "qpdf".into()],
        };
        assert!(e.to_string().contains("gs, qpdf"));
    }

    #[test]
    fn validation_classification() {
        assert!(PdfToolsError::NoExtractableText.is_validation());
        assert!(PdfToolsError::MissingParameter { name: "pages" }.is_validation());
        assert!(!PdfToolsError::ProcessingFailure {
            operation: "split".into(),
            detail: "x".into()
        }
        .is_validation());
        assert!(!PdfToolsError::Internal("x".into()).is_validation());
    }

    #[test]
    fn provider_error_converts_transparently() {
        let e: PdfToolsError = ProviderError::EmptyResponse {
            provider: "cohere".into(),
        }
        .into();
        assert!(matches!(e, PdfToolsError::Provider(_)));
        assert!(e.to_string().contains("cohere"));
    }

    #[test]
    fn rate_limit_display() {
        let e = ProviderError::RateLimited {
            provider: "deepseek".into(),
            retry_after_secs: Some(30),
        };
        assert!(e.to_string().contains("deepseek"));
    }

    #[test]
    fn below_threshold_display() {
        let e = AttemptError::BelowThreshold {
            reduction: 7.24,
            required: 20.0,
        };
        assert_eq!(e.to_string(), "reduction 7.2% below required 20.0%");
        assert!(e.is_rejection());
        assert!(AttemptError::Grew {
            original: 10,
            output: 12
        }
        .is_rejection());
        assert!(!AttemptError::EmptyOutput.is_rejection());
    }
}
