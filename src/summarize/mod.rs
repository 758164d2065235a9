//! Chunk-and-reduce summarization with an offline fallback.
//!
//! ## Pipeline
//!
//! ```text
//! text
//!  │
//!  ├─ 1. Guard    blank text, page limit (before any backend call)
//!  ├─ 2. Split    overlapping word-bounded chunks + page labels
//!  ├─ 3. Map      one completion per chunk (buffer_unordered, re-sorted)
//!  ├─ 4. Reduce   one completion fusing the labelled partials
//!  ├─ 5. JSON     optional structured re-encoding (failure → absent)
//!  └─ 6. Fallback any backend error in 3–4 → deterministic offline summary
//! ```
//!
//! Backend errors never reach the caller: the LLM path is abandoned as a
//! whole and the offline summary is returned with strategy
//! `offline_fallback`. Only validation errors (and extraction errors for
//! [`summarize_pdf`]) are returned as `Err`.

pub mod chunk;
pub mod offline;
pub mod postprocess;

use crate::config::{EngineConfig, ReturnFormat, SummaryConfig};
use crate::engines::ensure_pdf;
use crate::error::{PdfToolsError, ProviderError};
use crate::extract::{estimate_pages, extract_document};
use crate::llm::{CompletionRequest, LlmBackend};
use crate::output::{PartialSummary, Strategy, StructuredSummary, SummaryResult};
use crate::progress::{NoopProgressCallback, SummaryProgressCallback};
use crate::prompts;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Summarise a PDF: byte guard, text extraction, page guard, summary.
pub async fn summarize_pdf(
    bytes: &[u8],
    engine_config: &EngineConfig,
    backend: Option<&dyn LlmBackend>,
    config: &SummaryConfig,
) -> Result<SummaryResult, PdfToolsError> {
    check_size(bytes.len(), config)?;
    ensure_pdf(bytes)?;

    let doc = extract_document(bytes, engine_config).await?;
    info!("Extracted {} pages with {}", doc.page_count, doc.engine);
    summarize(&doc.text, doc.page_count, backend, config).await
}

/// Summarise plain text; the page count is estimated from the word count.
pub async fn summarize_text(
    text: &str,
    backend: Option<&dyn LlmBackend>,
    config: &SummaryConfig,
) -> Result<SummaryResult, PdfToolsError> {
    check_size(text.len(), config)?;
    let pages = estimate_pages(chunk::word_count(text));
    summarize(text, pages, backend, config).await
}

/// Summarise `text` taken from a `page_count`-page document.
///
/// With no backend the offline summary is produced directly.
pub async fn summarize(
    text: &str,
    page_count: usize,
    backend: Option<&dyn LlmBackend>,
    config: &SummaryConfig,
) -> Result<SummaryResult, PdfToolsError> {
    if text.trim().is_empty() {
        return Err(PdfToolsError::NoExtractableText);
    }
    if page_count > config.max_pages {
        return Err(PdfToolsError::TooManyPages {
            pages: page_count,
            max: config.max_pages,
        });
    }

    let cb: &dyn SummaryProgressCallback = match config.progress_callback.as_deref() {
        Some(cb) => cb,
        None => &NoopProgressCallback,
    };
    let start = Instant::now();

    let llm_result = match backend {
        Some(backend) => {
            info!("Summarizing with {}/{}", backend.name(), backend.model());
            llm_summary(text, page_count, backend, config, cb)
                .await
                .map_err(|e| e.to_string())
        }
        None => Err("no LLM backend configured".to_string()),
    };

    let mut result = match llm_result {
        Ok(result) => result,
        Err(reason) => {
            warn!("LLM summary failed, using offline fallback: {reason}");
            cb.on_fallback(&reason);
            offline_result(text, page_count, config)
        }
    };

    result.elapsed_secs = start.elapsed().as_secs_f64();
    cb.on_summary_complete(result.strategy.as_str(), result.elapsed_secs);
    Ok(result)
}

fn check_size(len: usize, config: &SummaryConfig) -> Result<(), PdfToolsError> {
    let bytes = len as u64;
    if bytes > config.max_bytes {
        return Err(PdfToolsError::InputTooLarge {
            bytes,
            max: config.max_bytes,
        });
    }
    Ok(())
}

// ── LLM path ─────────────────────────────────────────────────────────────────

async fn llm_summary(
    text: &str,
    page_count: usize,
    backend: &dyn LlmBackend,
    config: &SummaryConfig,
    cb: &dyn SummaryProgressCallback,
) -> Result<SummaryResult, ProviderError> {
    let mut chunks = chunk::chunk_text(text, config.target_words_per_chunk, config.overlap_sentences);
    chunk::assign_page_ranges(&mut chunks, page_count);
    let page_ranges: Vec<String> = chunks.iter().filter_map(|c| c.page_range.clone()).collect();
    let total = chunks.len();

    debug!("Split into {total} chunks over {page_count} pages");
    cb.on_summary_start(total, page_count);

    let mut partials: Vec<PartialSummary> = stream::iter(chunks.iter())
        .map(|c| async move {
            cb.on_chunk_start(c.index + 1, total);
            let request = CompletionRequest::new(
                prompts::map_prompt(config.mode, &c.text()),
                config.map_max_tokens,
                config.temperature,
            )
            .with_system(prompts::SUMMARY_SYSTEM_PROMPT);

            let raw = backend.complete(&request).await?;
            let text = postprocess::clean_partial(&raw);
            cb.on_chunk_complete(c.index + 1, total, text.len());
            debug!("Chunk {}/{}: {} chars", c.index + 1, total, text.len());
            Ok::<_, ProviderError>(PartialSummary {
                chunk_index: c.index,
                text,
            })
        })
        .buffer_unordered(config.concurrency.max(1))
        .try_collect()
        .await?;
    partials.sort_by_key(|p| p.chunk_index);

    cb.on_reduce_start(partials.len());
    let partial_texts: Vec<String> = partials.iter().map(|p| p.text.clone()).collect();
    let request = CompletionRequest::new(
        prompts::reduce_prompt(config.mode, &partial_texts, &page_ranges),
        config.reduce_max_tokens,
        config.temperature,
    )
    .with_system(prompts::SUMMARY_SYSTEM_PROMPT);
    let markdown = postprocess::clean_summary(&backend.complete(&request).await?);

    let structured = match config.format {
        ReturnFormat::Markdown => None,
        ReturnFormat::JsonAndMarkdown => structured_summary(backend, &markdown, config).await,
    };

    Ok(SummaryResult {
        strategy: Strategy::Llm,
        provider: Some(format!("{}/{}", backend.name(), backend.model())),
        markdown,
        structured,
        partials,
        chunk_count: total,
        page_count,
        page_ranges,
        elapsed_secs: 0.0,
    })
}

/// One extra call re-encoding the summary as JSON. Any failure means `None`.
async fn structured_summary(
    backend: &dyn LlmBackend,
    markdown: &str,
    config: &SummaryConfig,
) -> Option<StructuredSummary> {
    let request = CompletionRequest::new(
        prompts::structured_prompt(markdown),
        config.structured_max_tokens,
        0.0,
    );
    match backend.complete(&request).await {
        Ok(raw) => {
            let parsed = parse_structured(&raw);
            if parsed.is_none() {
                warn!("Structured summary was not valid JSON; returning Markdown only");
            }
            parsed
        }
        Err(e) => {
            warn!("Structured summary request failed: {e}");
            None
        }
    }
}

/// Parse the outermost `{…}` span of a model reply.
///
/// Models sometimes wrap JSON in fences or add a sentence around it.
pub fn parse_structured(raw: &str) -> Option<StructuredSummary> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

// ── Offline path ─────────────────────────────────────────────────────────────

fn offline_result(text: &str, page_count: usize, config: &SummaryConfig) -> SummaryResult {
    SummaryResult {
        strategy: Strategy::OfflineFallback,
        provider: None,
        markdown: offline::offline_summary(text, config.mode),
        structured: None,
        partials: Vec::new(),
        chunk_count: 1,
        page_count,
        page_ranges: vec![format!("p. 1–{page_count}")],
        elapsed_secs: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SummaryMode;
    use crate::progress::ProgressCallback;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Answers by prompt kind; optionally fails one kind.
    #[derive(Default)]
    struct MockBackend {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
        structured_reply: Option<&'static str>,
        /// Sleep so later chunks finish first.
        stagger: bool,
    }

    impl MockBackend {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        fn model(&self) -> &str {
            "m1"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let kind = if request.prompt.starts_with("Summarise") {
                "map"
            } else if request.prompt.starts_with("Merge") {
                "reduce"
            } else {
                "json"
            };
            if self.fail_on == Some(kind) {
                return Err(ProviderError::Auth {
                    provider: "mock".into(),
                    detail: "bad key".into(),
                });
            }
            match kind {
                "map" => {
                    if self.stagger {
                        tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(n as u64 * 10))).await;
                    }
                    let chunk = request.prompt.rsplit("Text:\n\n").next().unwrap_or_default();
                    Ok(format!("P:{chunk}  \n"))
                }
                "reduce" => Ok("```markdown\r\n# Summary\r\n\r\nFused.\r\n```".to_string()),
                _ => Ok(self.structured_reply.unwrap_or("not json").to_string()),
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl SummaryProgressCallback for Recorder {
        fn on_summary_start(&self, total: usize, pages: usize) {
            self.events.lock().unwrap().push(format!("start {total} {pages}"));
        }
        fn on_reduce_start(&self, partials: usize) {
            self.events.lock().unwrap().push(format!("reduce {partials}"));
        }
        fn on_fallback(&self, _reason: &str) {
            self.events.lock().unwrap().push("fallback".into());
        }
        fn on_summary_complete(&self, strategy: &str, _elapsed: f64) {
            self.events.lock().unwrap().push(format!("done {strategy}"));
        }
    }

    fn doc(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {i} has exactly seven words."))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn small_chunks() -> SummaryConfig {
        SummaryConfig::builder()
            .target_words_per_chunk(21)
            .overlap_sentences(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn llm_path_maps_every_chunk_then_reduces() {
        let backend = MockBackend::default();
        let text = doc(9);
        let config = small_chunks();
        let expected = chunk::chunk_text(&text, 21, 1);

        let result = summarize(&text, 3, Some(&backend), &config).await.unwrap();

        assert_eq!(result.strategy, Strategy::Llm);
        assert_eq!(result.provider.as_deref(), Some("mock/m1"));
        assert_eq!(result.chunk_count, expected.len());
        assert_eq!(backend.calls(), expected.len() + 1);
        assert_eq!(result.markdown, "# Summary\n\nFused.\n");
        assert_eq!(result.page_ranges.len(), expected.len());
        assert!(result.structured.is_none());
        for (partial, chunk) in result.partials.iter().zip(&expected) {
            assert_eq!(partial.text, format!("P:{}", chunk.text()));
        }
    }

    #[tokio::test]
    async fn concurrent_map_keeps_chunk_order() {
        let backend = MockBackend {
            stagger: true,
            ..Default::default()
        };
        let text = doc(12);
        let config = SummaryConfig::builder()
            .target_words_per_chunk(14)
            .overlap_sentences(0)
            .concurrency(4)
            .build()
            .unwrap();

        let result = summarize(&text, 4, Some(&backend), &config).await.unwrap();
        let indices: Vec<usize> = result.partials.iter().map(|p| p.chunk_index).collect();
        assert_eq!(indices, (0..result.chunk_count).collect::<Vec<_>>());
        assert!(result.partials[0].text.contains("Sentence number 0 "));
    }

    #[tokio::test]
    async fn map_failure_falls_back_offline() {
        let backend = MockBackend {
            fail_on: Some("map"),
            ..Default::default()
        };
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();
        let config = SummaryConfig::builder().progress_callback(cb).build().unwrap();

        let result = summarize(&doc(5), 3, Some(&backend), &config).await.unwrap();

        assert_eq!(result.strategy, Strategy::OfflineFallback);
        assert_eq!(result.chunk_count, 1);
        assert_eq!(result.page_ranges, ["p. 1–3"]);
        assert!(result.partials.is_empty());
        assert!(result.provider.is_none());
        assert!(result.markdown.starts_with("# Executive summary (offline)"));
        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events, ["start 1 3", "fallback", "done offline_fallback"]);
    }

    #[tokio::test]
    async fn reduce_failure_falls_back_offline() {
        let backend = MockBackend {
            fail_on: Some("reduce"),
            ..Default::default()
        };
        let config = SummaryConfig::builder().mode(SummaryMode::Rich).build().unwrap();
        let result = summarize(&doc(5), 1, Some(&backend), &config).await.unwrap();
        assert_eq!(result.strategy, Strategy::OfflineFallback);
        assert!(result.markdown.starts_with("# Structured summary (offline)"));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn structured_json_is_parsed_from_fenced_reply() {
        let backend = MockBackend {
            structured_reply: Some("```json\n{\"context\":\"c\",\"commands\":[\"#page=2\"]}\n```"),
            ..Default::default()
        };
        let config = SummaryConfig::builder()
            .format(ReturnFormat::JsonAndMarkdown)
            .build()
            .unwrap();
        let result = summarize(&doc(3), 1, Some(&backend), &config).await.unwrap();
        let structured = result.structured.unwrap();
        assert_eq!(structured.context, "c");
        assert_eq!(structured.commands, ["#page=2"]);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn bad_structured_reply_is_absent_not_fatal() {
        let config = SummaryConfig::builder()
            .format(ReturnFormat::JsonAndMarkdown)
            .build()
            .unwrap();

        let garbage = MockBackend::default();
        let result = summarize(&doc(3), 1, Some(&garbage), &config).await.unwrap();
        assert_eq!(result.strategy, Strategy::Llm);
        assert!(result.structured.is_none());

        let failing = MockBackend {
            fail_on: Some("json"),
            ..Default::default()
        };
        let result = summarize(&doc(3), 1, Some(&failing), &config).await.unwrap();
        assert_eq!(result.strategy, Strategy::Llm);
        assert!(result.structured.is_none());
    }

    #[tokio::test]
    async fn page_limit_is_checked_before_any_call() {
        let backend = MockBackend::default();
        let err = summarize(&doc(3), 16, Some(&backend), &SummaryConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PdfToolsError::TooManyPages { pages: 16, max: 15 }));
        assert!(err.is_validation());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let backend = MockBackend::default();
        let err = summarize(" \n\t ", 1, Some(&backend), &SummaryConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PdfToolsError::NoExtractableText));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn byte_limit_applies_to_text_input() {
        let config = SummaryConfig::builder().max_bytes(10).build().unwrap();
        let err = summarize_text(&doc(2), None, &config).await.unwrap_err();
        assert!(matches!(err, PdfToolsError::InputTooLarge { max: 10, .. }));
    }

    #[tokio::test]
    async fn without_backend_the_offline_summary_is_used() {
        let result = summarize_text(&doc(4), None, &SummaryConfig::default()).await.unwrap();
        assert_eq!(result.strategy, Strategy::OfflineFallback);
        assert_eq!(result.page_count, 1);
        assert_eq!(result.page_ranges, ["p. 1–1"]);
    }

    #[tokio::test]
    async fn pdf_byte_guard_runs_before_extraction() {
        let config = SummaryConfig::builder().max_bytes(4).build().unwrap();
        let err = summarize_pdf(b"%PDF-1.7 body", &EngineConfig::default(), None, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PdfToolsError::InputTooLarge { bytes: 13, max: 4 }));
    }

    #[test]
    fn parse_structured_finds_the_object() {
        let s = parse_structured("Here you go: {\"outline\":[\"a\",\"b\"]} done").unwrap();
        assert_eq!(s.outline, ["a", "b"]);
        assert!(parse_structured("no braces").is_none());
        assert!(parse_structured("} backwards {").is_none());
    }
}
