//! Result types returned by the engine cascades and the summarizer.
//!
//! All types are plain data, serialisable with serde so the CLI can print
//! them with `--json` and library callers can persist them.

use crate::error::AttemptError;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ── Engine cascades ──────────────────────────────────────────────────────

/// Provenance of one engine attempt inside a cascade.
///
/// Failed attempts keep their reason; the artifact itself is never retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Candidate name, e.g. `ghostscript-balanced` or `qpdf`.
    pub engine: String,
    pub success: bool,
    /// Size of the produced artifact; 0 when nothing was produced.
    pub output_size: u64,
    /// Reduction against the input size, one decimal place, floored at 0.
    pub reduction_percent: f64,
    /// Why the attempt was not accepted. `None` on success.
    pub error: Option<AttemptError>,
}

impl ConversionOutcome {
    pub(crate) fn accepted(engine: &str, output_size: u64, reduction_percent: f64) -> Self {
        Self {
            engine: engine.to_string(),
            success: true,
            output_size,
            reduction_percent,
            error: None,
        }
    }

    pub(crate) fn failed(engine: &str, output_size: u64, reduction_percent: f64, error: AttemptError) -> Self {
        Self {
            engine: engine.to_string(),
            success: false,
            output_size,
            reduction_percent,
            error: Some(error),
        }
    }
}

/// The artifact produced by a cascade plus its metadata.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    /// Output bytes (a PDF, or UTF-8 text for extraction).
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Name of the accepted candidate, or `original` for the degraded
    /// compress result.
    pub engine: String,
    /// Input size in bytes (sum of inputs for merge).
    pub original_size: u64,
    pub output_size: u64,
    /// One decimal place, never negative.
    pub reduction_percent: f64,
    /// Every attempt made, in cascade order.
    pub attempts: Vec<ConversionOutcome>,
}

impl std::fmt::Debug for ProcessedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessedDocument")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("engine", &self.engine)
            .field("original_size", &self.original_size)
            .field("output_size", &self.output_size)
            .field("reduction_percent", &self.reduction_percent)
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl ProcessedDocument {
    /// `true` when compression fell back to returning the input unchanged.
    pub fn is_degraded(&self) -> bool {
        self.engine == crate::engines::ORIGINAL_ENGINE
    }

    /// Write the artifact to `path`.
    pub async fn write_to(&self, path: &Path) -> Result<(), crate::error::PdfToolsError> {
        tokio::fs::write(path, &self.bytes)
            .await
            .map_err(|source| crate::error::PdfToolsError::OutputWriteFailed {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Text pulled out of a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub text: String,
    pub page_count: usize,
    /// Engine that produced the text.
    pub engine: String,
}

// ── Summarization ────────────────────────────────────────────────────────

/// A bounded run of consecutive sentences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// 0-based ordinal; contiguous across a split.
    pub index: usize,
    pub sentences: Vec<String>,
    pub word_count: usize,
    /// How many leading sentences were carried over from the previous chunk.
    pub overlap: usize,
    /// Approximate source pages, e.g. `p. 3–4`.
    pub page_range: Option<String>,
}

impl TextChunk {
    pub fn text(&self) -> String {
        self.sentences.join(" ")
    }

    /// Sentences that first appear in this chunk.
    pub fn new_sentences(&self) -> &[String] {
        &self.sentences[self.overlap.min(self.sentences.len())..]
    }
}

/// Map-phase output for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSummary {
    pub chunk_index: usize,
    pub text: String,
}

/// Which path produced a [`SummaryResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "llm")]
    Llm,
    #[serde(rename = "offline_fallback")]
    OfflineFallback,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Llm => "llm",
            Strategy::OfflineFallback => "offline_fallback",
        }
    }
}

/// Final output of the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub strategy: Strategy,
    /// `provider/model` when the LLM path succeeded.
    pub provider: Option<String>,
    pub markdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredSummary>,
    pub partials: Vec<PartialSummary>,
    pub chunk_count: usize,
    pub page_count: usize,
    pub page_ranges: Vec<String>,
    pub elapsed_secs: f64,
}

/// Machine-readable re-encoding of a summary.
///
/// Every field defaults to empty so a partially conforming model reply still
/// parses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredSummary {
    pub context: String,
    pub outline: Vec<String>,
    pub procedures: Vec<Procedure>,
    pub commands: Vec<String>,
    pub tools: Vec<Tool>,
    pub best_practices: Vec<String>,
    pub checklist: Vec<String>,
    pub glossary: Vec<GlossaryEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Procedure {
    pub title: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tool {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}
