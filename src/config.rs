//! Configuration types for engine cascades, summarization and LLM backends.
//!
//! Three independent structs cover the three subsystems:
//!
//! * [`EngineConfig`]: where to look for Ghostscript, QPDF, LibreOffice,
//!   pdftk and poppler, and how long to wait for them.
//! * [`SummaryConfig`]: chunking, size guards and token budgets for the
//!   chunk-and-reduce summarizer.
//! * [`LlmConfig`]: which provider answers completions, with which model
//!   and credentials.
//!
//! Each is built once via its builder and passed by reference; nothing in the
//! library reads the environment. The CLI maps flags and environment
//! variables onto these builders.

use crate::error::PdfToolsError;
use crate::progress::SummaryProgressCallback;
use engine_probe::{InstallScan, ProbeSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// ── Engines ──────────────────────────────────────────────────────────────

/// An external program the cascades know how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Ghostscript,
    Qpdf,
    LibreOffice,
    Pdftk,
    /// poppler's `pdftotext`.
    Pdftotext,
    /// poppler's `pdfinfo`.
    Pdfinfo,
}

impl Engine {
    pub const ALL: [Engine; 6] = [
        Engine::Ghostscript,
        Engine::Qpdf,
        Engine::LibreOffice,
        Engine::Pdftk,
        Engine::Pdftotext,
        Engine::Pdfinfo,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Engine::Ghostscript => "ghostscript",
            Engine::Qpdf => "qpdf",
            Engine::LibreOffice => "libreoffice",
            Engine::Pdftk => "pdftk",
            Engine::Pdftotext => "pdftotext",
            Engine::Pdfinfo => "pdfinfo",
        }
    }

    /// Commands tried on this platform when no override is configured.
    pub fn default_commands(self) -> Vec<String> {
        let names: &[&str] = match self {
            Engine::Ghostscript if cfg!(windows) => &["gswin64c", "gswin32c", "gs"],
            Engine::Ghostscript => &["gs"],
            Engine::Qpdf => &["qpdf"],
            Engine::LibreOffice if cfg!(windows) => &[
                r"C:\Program Files\LibreOffice\program\soffice.exe",
                r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
                "soffice",
            ],
            Engine::LibreOffice => &["soffice", "libreoffice"],
            Engine::Pdftk => &["pdftk"],
            Engine::Pdftotext => &["pdftotext"],
            Engine::Pdfinfo => &["pdfinfo"],
        };
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Arguments for the cheap capability check.
    pub fn version_args(self) -> &'static [&'static str] {
        match self {
            Engine::Pdftotext | Engine::Pdfinfo => &["-v"],
            _ => &["--version"],
        }
    }

    fn install_scans(self) -> Vec<InstallScan> {
        if !cfg!(windows) {
            return Vec::new();
        }
        match self {
            Engine::Ghostscript => vec![InstallScan::new(
                [r"C:\Program Files\gs", r"C:\Program Files (x86)\gs"],
                PathBuf::from("bin").join("gswin64c.exe"),
            )],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Configuration for the engine cascades.
///
/// # Example
/// ```rust
/// use edgequake_pdftools::{Engine, EngineConfig};
///
/// let config = EngineConfig::builder()
///     .commands(Engine::Ghostscript, ["/opt/gs/bin/gs"])
///     .build()
///     .unwrap();
/// assert_eq!(config.commands(Engine::Ghostscript), ["/opt/gs/bin/gs"]);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Candidate commands per engine, tried in order. Unset engines use
    /// [`Engine::default_commands`].
    overrides: Vec<(Engine, Vec<String>)>,

    /// Timeout for each `--version` probe. Default: 5s.
    pub probe_timeout: Duration,

    /// Scan vendor install directories (Windows only) when no command answers. Default: true.
    pub scan_install_dirs: bool,

    /// Replaces every candidate's own timeout when set.
    ///
    /// The built-in timeouts (60s for Ghostscript compression and merges,
    /// 30s elsewhere) suit real documents; tests use a short override.
    pub timeout_override: Option<Duration>,

    /// Parent directory for per-operation scratch directories. Default: the
    /// system temp directory.
    pub work_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overrides: Vec::new(),
            probe_timeout: engine_probe::DEFAULT_PROBE_TIMEOUT,
            scan_install_dirs: true,
            timeout_override: None,
            work_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Commands that will be probed for `engine`, in order.
    pub fn commands(&self, engine: Engine) -> Vec<String> {
        self.overrides
            .iter()
            .find(|(e, _)| *e == engine)
            .map(|(_, cmds)| cmds.clone())
            .unwrap_or_else(|| engine.default_commands())
    }

    /// The probe description for `engine` under this configuration.
    pub fn probe_spec(&self, engine: Engine) -> ProbeSpec {
        let mut spec = ProbeSpec::new(engine.label(), self.commands(engine))
            .version_args(engine.version_args().iter().copied())
            .timeout(self.probe_timeout);
        if self.scan_install_dirs {
            for scan in engine.install_scans() {
                spec = spec.install_scan(scan);
            }
        }
        spec
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Replace the candidate commands for one engine.
    pub fn commands(
        mut self,
        engine: Engine,
        commands: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let commands: Vec<String> = commands.into_iter().map(Into::into).collect();
        self.config.overrides.retain(|(e, _)| *e != engine);
        self.config.overrides.push((engine, commands));
        self
    }

    /// Put one explicit binary ahead of the default candidates.
    pub fn prefer(self, engine: Engine, path: impl Into<String>) -> Self {
        let mut commands = self.config.commands(engine);
        commands.insert(0, path.into());
        self.commands(engine, commands)
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn scan_install_dirs(mut self, v: bool) -> Self {
        self.config.scan_install_dirs = v;
        self
    }

    pub fn timeout_override(mut self, timeout: Duration) -> Self {
        self.config.timeout_override = Some(timeout);
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, PdfToolsError> {
        let c = &self.config;
        if c.probe_timeout.is_zero() {
            return Err(PdfToolsError::InvalidConfig(
                "Probe timeout must be > 0".into(),
            ));
        }
        if c.timeout_override.is_some_and(|t| t.is_zero()) {
            return Err(PdfToolsError::InvalidConfig(
                "Engine timeout must be > 0".into(),
            ));
        }
        if let Some((engine, _)) = c.overrides.iter().find(|(_, cmds)| cmds.is_empty()) {
            return Err(PdfToolsError::InvalidConfig(format!(
                "At least one command is required for {engine}"
            )));
        }
        Ok(self.config)
    }
}

// ── Summarization ────────────────────────────────────────────────────────

/// Configuration for the chunk-and-reduce summarizer.
///
/// # Example
/// ```rust
/// use edgequake_pdftools::{SummaryConfig, SummaryMode};
///
/// let config = SummaryConfig::builder()
///     .mode(SummaryMode::Rich)
///     .max_pages(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.target_words_per_chunk, 800);
/// ```
#[derive(Clone)]
pub struct SummaryConfig {
    /// Output style. Default: [`SummaryMode::Executive`].
    pub mode: SummaryMode,

    /// Whether to request the structured JSON re-encoding. Default: Markdown only.
    pub format: ReturnFormat,

    /// Soft word budget per chunk. Default: 800.
    ///
    /// A chunk closes before the sentence that would push it over the
    /// budget; a single sentence longer than the budget still forms its own
    /// chunk.
    pub target_words_per_chunk: usize,

    /// Sentences carried from the end of one chunk into the next. Default: 2.
    pub overlap_sentences: usize,

    /// Largest page count accepted. Default: 15.
    pub max_pages: usize,

    /// Largest input accepted, in bytes. Default: 10 MB.
    pub max_bytes: u64,

    /// Concurrent map calls. Default: 1.
    ///
    /// Partial summaries are re-sorted by chunk ordinal before reduction, so
    /// raising this never changes the reducer's input order.
    pub concurrency: usize,

    /// Output budget per map call. Default: 320.
    pub map_max_tokens: usize,

    /// Output budget for the reduce call. Default: 800.
    pub reduce_max_tokens: usize,

    /// Output budget for the structured JSON call. Default: 800.
    pub structured_max_tokens: usize,

    /// Sampling temperature for map and reduce calls. Default: 0.2.
    ///
    /// The structured extraction always runs at 0.0.
    pub temperature: f32,

    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn SummaryProgressCallback>>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            mode: SummaryMode::default(),
            format: ReturnFormat::default(),
            target_words_per_chunk: 800,
            overlap_sentences: 2,
            max_pages: 15,
            max_bytes: 10 * 1024 * 1024,
            concurrency: 1,
            map_max_tokens: 320,
            reduce_max_tokens: 800,
            structured_max_tokens: 800,
            temperature: 0.2,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SummaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummaryConfig")
            .field("mode", &self.mode)
            .field("format", &self.format)
            .field("target_words_per_chunk", &self.target_words_per_chunk)
            .field("overlap_sentences", &self.overlap_sentences)
            .field("max_pages", &self.max_pages)
            .field("max_bytes", &self.max_bytes)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn SummaryProgressCallback>"),
            )
            .finish()
    }
}

impl SummaryConfig {
    pub fn builder() -> SummaryConfigBuilder {
        SummaryConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SummaryConfig`].
pub struct SummaryConfigBuilder {
    config: SummaryConfig,
}

impl SummaryConfigBuilder {
    pub fn mode(mut self, mode: SummaryMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn format(mut self, format: ReturnFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn target_words_per_chunk(mut self, n: usize) -> Self {
        self.config.target_words_per_chunk = n;
        self
    }

    pub fn overlap_sentences(mut self, n: usize) -> Self {
        self.config.overlap_sentences = n;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn max_bytes(mut self, n: u64) -> Self {
        self.config.max_bytes = n;
        self
    }

    /// Convenience for `max_bytes(mb * 1024 * 1024)`.
    pub fn max_megabytes(self, mb: u64) -> Self {
        self.max_bytes(mb.saturating_mul(1024 * 1024))
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn map_max_tokens(mut self, n: usize) -> Self {
        self.config.map_max_tokens = n;
        self
    }

    pub fn reduce_max_tokens(mut self, n: usize) -> Self {
        self.config.reduce_max_tokens = n;
        self
    }

    pub fn structured_max_tokens(mut self, n: usize) -> Self {
        self.config.structured_max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn SummaryProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SummaryConfig, PdfToolsError> {
        let c = &self.config;
        if c.target_words_per_chunk == 0 {
            return Err(PdfToolsError::InvalidConfig(
                "Target words per chunk must be ≥ 1".into(),
            ));
        }
        if c.max_pages == 0 {
            return Err(PdfToolsError::InvalidConfig("Max pages must be ≥ 1".into()));
        }
        if c.max_bytes == 0 {
            return Err(PdfToolsError::InvalidConfig("Max bytes must be ≥ 1".into()));
        }
        if c.map_max_tokens == 0 || c.reduce_max_tokens == 0 || c.structured_max_tokens == 0 {
            return Err(PdfToolsError::InvalidConfig(
                "Token budgets must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Summary style requested from the LLM (and mirrored by the offline path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    /// Context, key points and conclusion; 250–500 words. (default)
    #[default]
    Executive,
    /// Eight fixed sections covering procedures, commands and tools; 800–1,200 words.
    Rich,
}

impl FromStr for SummaryMode {
    type Err = PdfToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "executive" => Ok(Self::Executive),
            "rich" => Ok(Self::Rich),
            other => Err(PdfToolsError::InvalidConfig(format!(
                "Unknown summary mode '{other}' (expected executive or rich)"
            ))),
        }
    }
}

/// Shape of the summarizer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReturnFormat {
    /// Markdown only. (default)
    #[default]
    #[serde(rename = "markdown")]
    Markdown,
    /// Markdown plus a structured JSON re-encoding.
    #[serde(rename = "json+markdown")]
    JsonAndMarkdown,
}

impl FromStr for ReturnFormat {
    type Err = PdfToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json+markdown" | "json" => Ok(Self::JsonAndMarkdown),
            other => Err(PdfToolsError::InvalidConfig(format!(
                "Unknown return format '{other}' (expected markdown or json+markdown)"
            ))),
        }
    }
}

// ── LLM ──────────────────────────────────────────────────────────────────

/// Which provider answers completions.
///
/// `deepseek` and `cohere` use native HTTP bindings; any other name is
/// handed to `edgequake-llm`'s provider factory.
#[derive(Clone)]
pub struct LlmConfig {
    /// Provider name. Default: "deepseek".
    pub provider: String,

    /// Model identifier. If None, uses the provider default
    /// (`deepseek-chat`, `command-light`).
    pub model: Option<String>,

    /// API key for the native bindings. `edgequake-llm` providers read
    /// their own environment variables.
    pub api_key: Option<String>,

    /// Override of the provider's base URL (tests, proxies).
    pub base_url: Option<String>,

    /// Per-request timeout in seconds. Default: 60.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: None,
            api_key: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    pub fn builder() -> LlmConfigBuilder {
        LlmConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Builder for [`LlmConfig`].
#[derive(Debug)]
pub struct LlmConfigBuilder {
    config: LlmConfig,
}

impl LlmConfigBuilder {
    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.config.provider = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<LlmConfig, PdfToolsError> {
        self.config.provider = self.config.provider.trim().to_ascii_lowercase();
        if self.config.provider.is_empty() {
            return Err(PdfToolsError::InvalidConfig(
                "Provider name must not be empty".into(),
            ));
        }
        if self.config.timeout_secs == 0 {
            return Err(PdfToolsError::InvalidConfig(
                "LLM timeout must be ≥ 1s".into(),
            ));
        }
        if self.config.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.config.api_key = None;
        }
        Ok(self.config)
    }
}
