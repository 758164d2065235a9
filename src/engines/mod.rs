//! Cascading engine selection for compress, split, merge, encrypt, Word
//! conversion and text extraction.
//!
//! Every operation is a declarative list of [`EngineCandidate`]s evaluated by
//! one generic runner ([`select::run_cascade`]):
//!
//! ```text
//! compress   gs balanced ≥20% → gs aggressive ≥20% → gs ultra → qpdf ≥5% → libreoffice
//! split      gs -sPageList → qpdf --pages
//! merge      gs pdfwrite → qpdf --empty --pages
//! encrypt    pdftk user_pw → qpdf --encrypt … 256
//! word→pdf   libreoffice --convert-to pdf
//! pdf→docx   libreoffice writer_pdf_import → libreoffice via odt
//! text       pdftotext -layout → gs txtwrite
//! pages      qpdf --show-npages → pdfinfo
//! ```
//!
//! Engines are located once per call through [`engine_probe`].

pub mod candidates;
pub mod runner;
pub mod select;

pub use candidates::{Acceptance, EngineCandidate, OutputTarget};
pub use select::{reduction_percent, Invocation, Invoker, Params};

use crate::config::{Engine, EngineConfig};
use crate::error::{AttemptError, PdfToolsError};
use crate::output::ProcessedDocument;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// Engine name reported when compression returns the input unchanged.
pub const ORIGINAL_ENGINE: &str = "original";

/// Name of the single PDF input inside the scratch directory.
pub(crate) const INPUT_FILE: &str = "input.pdf";

/// OOXML (`.docx`) is a zip container.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Legacy `.doc` is an OLE2 compound file.
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// What a cascade is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Compress,
    Split,
    Merge,
    Encrypt,
    ExtractText,
    PageCount,
    WordToPdf,
    PdfToDocx,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Operation::Compress => "compress",
            Operation::Split => "split",
            Operation::Merge => "merge",
            Operation::Encrypt => "encrypt",
            Operation::ExtractText => "extract-text",
            Operation::PageCount => "page-count",
            Operation::WordToPdf => "word-to-pdf",
            Operation::PdfToDocx => "pdf-to-docx",
        }
    }

    /// Prefix of the per-call scratch directory.
    pub fn temp_prefix(self) -> &'static str {
        match self {
            Operation::Compress => "comp-",
            Operation::Split => "split-",
            Operation::Merge => "merge-",
            Operation::Encrypt => "encrypt-",
            Operation::ExtractText => "text-",
            Operation::PageCount => "pages-",
            Operation::WordToPdf => "word2pdf-",
            Operation::PdfToDocx => "pdf2docx-",
        }
    }

    /// The built-in candidate list.
    pub fn candidates(self) -> Vec<EngineCandidate> {
        match self {
            Operation::Compress => candidates::compress(),
            Operation::Split => candidates::split(),
            Operation::Merge => candidates::merge(),
            Operation::Encrypt => candidates::encrypt(),
            Operation::ExtractText => candidates::extract_text(),
            Operation::PageCount => candidates::page_count(),
            Operation::WordToPdf => candidates::word_to_pdf(),
            Operation::PdfToDocx => candidates::pdf_to_docx(),
        }
    }

    /// Extension of an input file in the scratch directory. LibreOffice picks
    /// its import filter from it.
    pub(crate) fn input_extension(self, bytes: &[u8]) -> &'static str {
        match self {
            Operation::WordToPdf if bytes.starts_with(ZIP_MAGIC) => "docx",
            Operation::WordToPdf => "doc",
            _ => "pdf",
        }
    }

    /// Only compression may hand back the original bytes.
    pub(crate) fn allows_degraded(self) -> bool {
        matches!(self, Operation::Compress)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Production invoker ───────────────────────────────────────────────────

/// Locates engines with [`engine_probe`] and runs them as child processes.
#[derive(Debug, Clone)]
pub struct SystemInvoker {
    config: EngineConfig,
}

impl SystemInvoker {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Invoker for SystemInvoker {
    async fn locate(&self, engine: Engine) -> Option<PathBuf> {
        engine_probe::locate(&self.config.probe_spec(engine)).await
    }

    async fn invoke(&self, call: &Invocation<'_>) -> Result<Vec<u8>, AttemptError> {
        runner::run(call.program, &call.args, call.attempt_dir, call.timeout).await
    }
}

// ── Public API ───────────────────────────────────────────────────────────

/// Run `operation`'s built-in cascade over `inputs`.
pub async fn select(
    operation: Operation,
    inputs: &[&[u8]],
    params: &Params,
    config: &EngineConfig,
) -> Result<ProcessedDocument, PdfToolsError> {
    let invoker = SystemInvoker::new(config);
    select_with(&invoker, operation, inputs, params, config).await
}

/// [`select`] with a caller-supplied [`Invoker`].
pub async fn select_with(
    invoker: &dyn Invoker,
    operation: Operation,
    inputs: &[&[u8]],
    params: &Params,
    config: &EngineConfig,
) -> Result<ProcessedDocument, PdfToolsError> {
    validate(operation, inputs, params)?;
    let params = Params {
        pages: params.pages.as_deref().map(strip_whitespace),
        password: params.password.clone(),
    };
    select::run_cascade(invoker, operation, &operation.candidates(), inputs, &params, config).await
}

/// Compress a PDF.
///
/// Tries three Ghostscript profiles, QPDF and LibreOffice in turn. When every
/// artifact misses its threshold the input comes back unchanged with engine
/// [`ORIGINAL_ENGINE`] and 0% reduction.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdftools::{compress, EngineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("report.pdf")?;
/// let doc = compress(&bytes, &EngineConfig::default()).await?;
/// println!("{}: {:.1}% smaller", doc.engine, doc.reduction_percent);
/// # Ok(())
/// # }
/// ```
pub async fn compress(input: &[u8], config: &EngineConfig) -> Result<ProcessedDocument, PdfToolsError> {
    select(Operation::Compress, &[input], &Params::default(), config).await
}

/// Keep only `pages` (e.g. `1-3,5,7-10`).
pub async fn split(
    input: &[u8],
    pages: &str,
    config: &EngineConfig,
) -> Result<ProcessedDocument, PdfToolsError> {
    let params = Params {
        pages: Some(pages.to_string()),
        ..Params::default()
    };
    select(Operation::Split, &[input], &params, config).await
}

/// Concatenate two or more PDFs in order.
pub async fn merge(inputs: &[&[u8]], config: &EngineConfig) -> Result<ProcessedDocument, PdfToolsError> {
    select(Operation::Merge, inputs, &Params::default(), config).await
}

/// Protect a PDF with a user password.
pub async fn encrypt(
    input: &[u8],
    password: &str,
    config: &EngineConfig,
) -> Result<ProcessedDocument, PdfToolsError> {
    let params = Params {
        password: Some(password.to_string()),
        ..Params::default()
    };
    select(Operation::Encrypt, &[input], &params, config).await
}

/// Convert a Word document (`.docx` or legacy `.doc`) to PDF.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdftools::{word_to_pdf, EngineConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("letter.docx")?;
/// let doc = word_to_pdf(&bytes, &EngineConfig::default()).await?;
/// std::fs::write("letter.pdf", &doc.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn word_to_pdf(input: &[u8], config: &EngineConfig) -> Result<ProcessedDocument, PdfToolsError> {
    select(Operation::WordToPdf, &[input], &Params::default(), config).await
}

/// Convert a PDF to an editable DOCX.
///
/// Layout fidelity is whatever LibreOffice's PDF import gives; scanned pages
/// come out as images.
pub async fn pdf_to_docx(input: &[u8], config: &EngineConfig) -> Result<ProcessedDocument, PdfToolsError> {
    select(Operation::PdfToDocx, &[input], &Params::default(), config).await
}

/// Installed state of every known engine.
pub async fn engine_report(config: &EngineConfig) -> Vec<(Engine, Option<PathBuf>)> {
    let mut report = Vec::with_capacity(Engine::ALL.len());
    for engine in Engine::ALL {
        let found = engine_probe::locate(&config.probe_spec(engine)).await;
        report.push((engine, found));
    }
    report
}

// ── Validation ───────────────────────────────────────────────────────────

/// Reject unusable requests before any engine is probed.
pub(crate) fn validate(operation: Operation, inputs: &[&[u8]], params: &Params) -> Result<(), PdfToolsError> {
    if inputs.is_empty() {
        return Err(PdfToolsError::MissingParameter { name: "input" });
    }
    for input in inputs {
        match operation {
            Operation::WordToPdf => ensure_word(input)?,
            _ => ensure_pdf(input)?,
        }
    }
    match operation {
        Operation::Merge if inputs.len() < 2 => Err(PdfToolsError::InvalidInput {
            reason: format!("merge needs at least 2 PDFs, got {}", inputs.len()),
        }),
        Operation::Split
            if params
                .pages
                .as_deref()
                .map(strip_whitespace)
                .is_none_or(|p| p.is_empty()) =>
        {
            Err(PdfToolsError::MissingParameter { name: "pages" })
        }
        Operation::Encrypt if params.password.as_deref().is_none_or(str::is_empty) => {
            Err(PdfToolsError::MissingParameter { name: "password" })
        }
        _ => Ok(()),
    }
}

/// Check the `%PDF` magic.
pub fn ensure_pdf(bytes: &[u8]) -> Result<(), PdfToolsError> {
    if bytes.is_empty() {
        return Err(PdfToolsError::InvalidInput {
            reason: "input is empty".into(),
        });
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(PdfToolsError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

/// Check for a `.docx` or `.doc` container.
pub fn ensure_word(bytes: &[u8]) -> Result<(), PdfToolsError> {
    if bytes.is_empty() {
        return Err(PdfToolsError::InvalidInput {
            reason: "input is empty".into(),
        });
    }
    if !bytes.starts_with(ZIP_MAGIC) && !bytes.starts_with(OLE_MAGIC) {
        return Err(PdfToolsError::InvalidInput {
            reason: "not a Word document (expected .docx or .doc)".into(),
        });
    }
    Ok(())
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.4\n%fake\n";

    #[test]
    fn rejects_non_pdf() {
        let err = validate(Operation::Compress, &[b"GIF89a".as_slice()], &Params::default()).unwrap_err();
        assert!(matches!(err, PdfToolsError::NotAPdf { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn merge_needs_two_inputs() {
        let err = validate(Operation::Merge, &[PDF], &Params::default()).unwrap_err();
        assert!(matches!(err, PdfToolsError::InvalidInput { .. }));
        assert!(validate(Operation::Merge, &[PDF, PDF], &Params::default()).is_ok());
    }

    #[test]
    fn split_needs_pages() {
        let blank = Params {
            pages: Some("  ".into()),
            ..Params::default()
        };
        assert!(matches!(
            validate(Operation::Split, &[PDF], &blank),
            Err(PdfToolsError::MissingParameter { name: "pages" })
        ));
    }

    #[test]
    fn encrypt_needs_password() {
        let empty = Params {
            password: Some(String::new()),
            ..Params::default()
        };
        assert!(matches!(
            validate(Operation::Encrypt, &[PDF], &empty),
            Err(PdfToolsError::MissingParameter { name: "password" })
        ));
    }

    #[test]
    fn word_conversion_checks_word_magic() {
        let docx: &[u8] = b"PK\x03\x04[Content_Types].xml";
        let doc: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00];
        assert!(validate(Operation::WordToPdf, &[docx], &Params::default()).is_ok());
        assert!(validate(Operation::WordToPdf, &[doc], &Params::default()).is_ok());
        assert!(matches!(
            validate(Operation::WordToPdf, &[PDF], &Params::default()),
            Err(PdfToolsError::InvalidInput { .. })
        ));
        assert!(matches!(
            validate(Operation::PdfToDocx, &[docx], &Params::default()),
            Err(PdfToolsError::NotAPdf { .. })
        ));
    }

    #[test]
    fn word_inputs_are_named_by_container() {
        assert_eq!(Operation::WordToPdf.input_extension(b"PK\x03\x04"), "docx");
        assert_eq!(Operation::WordToPdf.input_extension(&[0xD0, 0xCF]), "doc");
        assert_eq!(Operation::PdfToDocx.input_extension(PDF), "pdf");
    }

    #[test]
    fn page_ranges_lose_whitespace() {
        assert_eq!(strip_whitespace(" 1-3, 5 ,7 - 10 "), "1-3,5,7-10");
    }

    #[test]
    fn temp_prefixes_are_distinct() {
        let ops = [
            Operation::Compress,
            Operation::Split,
            Operation::Merge,
            Operation::Encrypt,
            Operation::ExtractText,
            Operation::PageCount,
            Operation::WordToPdf,
            Operation::PdfToDocx,
        ];
        let mut prefixes: Vec<_> = ops.iter().map(|o| o.temp_prefix()).collect();
        prefixes.sort();
        prefixes.dedup();
        assert_eq!(prefixes.len(), ops.len());
    }
}
