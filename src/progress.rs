//! Progress-callback trait for summarization events.
//!
//! Inject an [`Arc<dyn SummaryProgressCallback>`] via
//! [`crate::config::SummaryConfigBuilder::progress_callback`] to receive
//! events as the summarizer maps each chunk and reduces the partials.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdftools::{SummaryConfig, SummaryProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     mapped: AtomicUsize,
//! }
//!
//! impl SummaryProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: usize, total: usize, summary_len: usize) {
//!         self.mapped.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("chunk {}/{} summarised ({} bytes)", chunk, total, summary_len);
//!     }
//! }
//!
//! let config = SummaryConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { mapped: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the summarizer as it works through the chunks.
///
/// All methods have default no-op implementations. With `concurrency > 1`
/// the per-chunk methods may be called from several tasks at once.
pub trait SummaryProgressCallback: Send + Sync {
    /// Called once after splitting, before any LLM call.
    ///
    /// # Arguments
    /// * `total_chunks`: number of chunks that will be mapped
    /// * `page_count`: pages in the source document
    fn on_summary_start(&self, total_chunks: usize, page_count: usize) {
        let _ = (total_chunks, page_count);
    }

    /// Called just before a chunk's map request is sent.
    ///
    /// `chunk` is 1-indexed.
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize) {
        let _ = (chunk, total_chunks);
    }

    /// Called when a chunk's partial summary arrives.
    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, summary_len: usize) {
        let _ = (chunk, total_chunks, summary_len);
    }

    /// Called before the reduce request is sent.
    fn on_reduce_start(&self, partials: usize) {
        let _ = partials;
    }

    /// Called when the LLM path is abandoned for the offline summary.
    ///
    /// # Arguments
    /// * `reason`: human-readable provider error
    fn on_fallback(&self, reason: &str) {
        let _ = reason;
    }

    /// Called once with the strategy that produced the result
    /// (`llm` or `offline_fallback`).
    fn on_summary_complete(&self, strategy: &str, elapsed_secs: f64) {
        let _ = (strategy, elapsed_secs);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl SummaryProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SummaryConfig`].
pub type ProgressCallback = Arc<dyn SummaryProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        fallbacks: Mutex<Vec<String>>,
        strategy: Mutex<Option<String>>,
    }

    impl SummaryProgressCallback for TrackingCallback {
        fn on_chunk_start(&self, _chunk: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _chunk: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_fallback(&self, reason: &str) {
            self.fallbacks.lock().unwrap().push(reason.to_string());
        }

        fn on_summary_complete(&self, strategy: &str, _elapsed: f64) {
            *self.strategy.lock().unwrap() = Some(strategy.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_summary_start(3, 9);
        cb.on_chunk_start(1, 3);
        cb.on_chunk_complete(1, 3, 120);
        cb.on_reduce_start(3);
        cb.on_fallback("timeout");
        cb.on_summary_complete("llm", 1.5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_chunk_start(1, 2);
        tracker.on_chunk_complete(1, 2, 80);
        tracker.on_chunk_start(2, 2);
        tracker.on_fallback("HTTP 401");
        tracker.on_summary_complete("offline_fallback", 0.1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.fallbacks.lock().unwrap(), ["HTTP 401"]);
        assert_eq!(
            tracker.strategy.lock().unwrap().as_deref(),
            Some("offline_fallback")
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_summary_start(1, 1);
        cb.on_chunk_complete(1, 1, 10);
    }
}
