//! # edgequake-pdftools
//!
//! Compress, split, merge, convert and summarise PDF documents by orchestrating
//! external engines and LLM providers.
//!
//! ## Why this crate?
//!
//! Ghostscript, QPDF, LibreOffice, pdftk and poppler each do one job well,
//! but none of them is installed everywhere and none of them wins on every
//! document. This crate decides which tool to run, in what order, with which
//! acceptance threshold and timeout, and reports what happened. Summaries go
//! through the same idea: an LLM when one answers, a deterministic local
//! summary when it does not.
//!
//! ## Components
//!
//! ```text
//! bytes ──┬─ engines   cascading selector  gs → gs → gs → qpdf → libreoffice
//!         │              └─ engine-probe   locate binaries before running them
//!         │
//!         └─ summarize extract text → chunk → map → reduce → (JSON)
//!                        └─ llm            DeepSeek | Cohere | edgequake-llm
//!                        └─ offline        fallback, no network
//!
//! prompt ─── generate ─── llm.stream ─── stream::relay_stream ─── tokens
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdftools::{compress, resolve_backend, summarize_pdf};
//! use edgequake_pdftools::{EngineConfig, LlmConfig, SummaryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engines = EngineConfig::default();
//!     let bytes = std::fs::read("manual.pdf")?;
//!
//!     let small = compress(&bytes, &engines).await?;
//!     eprintln!("{}: -{:.1}%", small.engine, small.reduction_percent);
//!
//!     let llm = LlmConfig::builder().provider("deepseek").api_key("sk-…").build()?;
//!     let backend = resolve_backend(&llm)?;
//!     let summary = summarize_pdf(&bytes, &engines, Some(backend.as_ref()), &SummaryConfig::default()).await?;
//!     println!("{}", summary.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftools` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdftools = { version = "0.1", default-features = false }
//! ```
//!
//! ## External Engines
//!
//! | Engine | Used for |
//! |--------|----------|
//! | Ghostscript | compress (3 profiles), split, merge, text fallback |
//! | QPDF | compress, split, merge, encrypt, page count |
//! | LibreOffice | last-resort compress, Word → PDF, PDF → DOCX |
//! | pdftk | encrypt |
//! | poppler (`pdftotext`, `pdfinfo`) | text extraction, page count |
//!
//! `pdftools engines` lists which of them are installed.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engines;
pub mod error;
pub mod extract;
pub mod generate;
pub mod llm;
pub mod output;
pub mod progress;
pub mod prompts;
pub mod stream;
pub mod summarize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    Engine, EngineConfig, EngineConfigBuilder, LlmConfig, LlmConfigBuilder, ReturnFormat, SummaryConfig,
    SummaryConfigBuilder, SummaryMode,
};
pub use engines::{compress, encrypt, engine_report, merge, pdf_to_docx, split, word_to_pdf, Operation};
pub use error::{AttemptError, PdfToolsError, ProviderError};
pub use extract::extract_document;
pub use generate::{generate, generate_stream, GenerateRequest};
pub use llm::{resolve_backend, CompletionRequest, LlmBackend};
pub use output::{
    ConversionOutcome, ExtractedDocument, PartialSummary, ProcessedDocument, Strategy, StructuredSummary,
    SummaryResult, TextChunk,
};
pub use progress::{NoopProgressCallback, ProgressCallback, SummaryProgressCallback};
pub use stream::{forward, relay_stream, TokenRelay, TokenStream};
pub use summarize::{summarize, summarize_pdf, summarize_text};
