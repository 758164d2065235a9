//! Plain-text extraction and page counting.
//!
//! Both run through the engine cascade: text via `pdftotext -layout` with a
//! Ghostscript `txtwrite` fallback, the page count via `qpdf --show-npages`
//! with a `pdfinfo` fallback. When neither page counter is installed the
//! count is recovered from the form feeds `pdftotext` puts between pages.

use crate::config::EngineConfig;
use crate::engines::{self, Operation, Params};
use crate::error::PdfToolsError;
use crate::output::ExtractedDocument;
use tracing::{debug, warn};

/// Words per page assumed when no page count is available.
pub const WORDS_PER_PAGE_ESTIMATE: usize = 250;

/// Extract text and page count from PDF bytes.
///
/// A PDF without a text layer is [`PdfToolsError::NoExtractableText`].
pub async fn extract_document(
    bytes: &[u8],
    config: &EngineConfig,
) -> Result<ExtractedDocument, PdfToolsError> {
    let text_doc = engines::select(Operation::ExtractText, &[bytes], &Params::default(), config).await?;
    let text = String::from_utf8_lossy(&text_doc.bytes).into_owned();
    // Scanned pages leave only form feeds behind.
    if text.trim().is_empty() {
        debug!("{} found no text layer", text_doc.engine);
        return Err(PdfToolsError::NoExtractableText);
    }

    let page_count = match count_pages(bytes, config).await {
        Ok(n) => n,
        Err(e) => {
            let estimate = pages_from_text(&text);
            warn!("Page count unavailable ({e}); estimated {estimate} from text");
            estimate
        }
    };
    debug!(
        "Extracted {} chars over {} pages with {}",
        text.len(),
        page_count,
        text_doc.engine
    );

    Ok(ExtractedDocument {
        text,
        page_count,
        engine: text_doc.engine,
    })
}

/// Number of pages in a PDF.
pub async fn count_pages(bytes: &[u8], config: &EngineConfig) -> Result<usize, PdfToolsError> {
    let doc = engines::select(Operation::PageCount, &[bytes], &Params::default(), config).await?;
    let stdout = String::from_utf8_lossy(&doc.bytes);
    parse_page_count(&stdout).ok_or_else(|| PdfToolsError::ProcessingFailure {
        operation: Operation::PageCount.to_string(),
        detail: format!("{} printed no page count", doc.engine),
    })
}

/// Read either `qpdf --show-npages` output (a bare number) or a `pdfinfo`
/// report (`Pages:   12`).
pub fn parse_page_count(stdout: &str) -> Option<usize> {
    if let Ok(n) = stdout.trim().parse::<usize>() {
        return Some(n);
    }
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

/// Page count implied by extracted text.
///
/// `pdftotext` terminates every page with a form feed; without any, one page
/// per [`WORDS_PER_PAGE_ESTIMATE`] words is assumed.
pub fn pages_from_text(text: &str) -> usize {
    let feeds = text.matches('\u{000C}').count();
    if feeds > 0 {
        let trailing_partial = !text.rsplit('\u{000C}').next().unwrap_or("").trim().is_empty();
        return feeds + usize::from(trailing_partial);
    }
    estimate_pages(text.split_whitespace().count())
}

/// `max(1, ceil(words / 250))`.
pub fn estimate_pages(words: usize) -> usize {
    words.div_ceil(WORDS_PER_PAGE_ESTIMATE).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_qpdf_output() {
        assert_eq!(parse_page_count("12\n"), Some(12));
    }

    #[test]
    fn parses_pdfinfo_report() {
        let report = "Title:          Report\nProducer:       gs\nPages:          7\nEncrypted:      no\n";
        assert_eq!(parse_page_count(report), Some(7));
    }

    #[test]
    fn garbage_has_no_count() {
        assert_eq!(parse_page_count("error: bad file"), None);
    }

    #[test]
    fn form_feeds_count_pages() {
        assert_eq!(pages_from_text("one\u{000C}two\u{000C}three\u{000C}"), 3);
        assert_eq!(pages_from_text("one\u{000C}two"), 2);
    }

    #[test]
    fn word_estimate() {
        assert_eq!(estimate_pages(0), 1);
        assert_eq!(estimate_pages(250), 1);
        assert_eq!(estimate_pages(251), 2);
        let text = "word ".repeat(600);
        assert_eq!(pages_from_text(&text), 3);
    }
}
