//! CLI binary for edgequake-pdftools.
//!
//! A thin shim over the library crate: flags and environment variables are
//! mapped onto `EngineConfig`, `SummaryConfig` and `LlmConfig`, results are
//! printed as text or JSON.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_pdftools::{
    compress, encrypt, engine_report, forward, generate, generate_stream, merge, pdf_to_docx, resolve_backend, split,
    summarize_pdf, summarize_text, word_to_pdf, Engine, EngineConfig, GenerateRequest, LlmBackend, LlmConfig, ProcessedDocument,
    ProgressCallback, ReturnFormat, Strategy, SummaryConfig, SummaryMode, SummaryProgressCallback,
    SummaryResult,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders the summarizer's progress: a spinner while text is extracted,
/// then a bar over the chunks.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting text…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl SummaryProgressCallback for CliProgressCallback {
    fn on_summary_start(&self, total_chunks: usize, page_count: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} chunks  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_chunks as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Summarizing");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_chunks} chunks over {page_count} pages"))
        ));
    }

    fn on_chunk_start(&self, chunk: usize, _total_chunks: usize) {
        self.bar.set_message(format!("chunk {chunk}"));
    }

    fn on_chunk_complete(&self, chunk: usize, total_chunks: usize, summary_len: usize) {
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}",
            green("✓"),
            chunk,
            total_chunks,
            dim(&format!("{summary_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_reduce_start(&self, partials: usize) {
        self.bar.set_prefix("Reducing");
        self.bar.set_message(format!("fusing {partials} partial summaries…"));
    }

    fn on_fallback(&self, reason: &str) {
        let msg = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!("  {} LLM unavailable: {}", red("✗"), red(&msg)));
    }

    fn on_summary_complete(&self, strategy: &str, elapsed_secs: f64) {
        self.bar.finish_and_clear();
        eprintln!("{} summary via {} in {:.1}s", green("✔"), bold(strategy), elapsed_secs);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compress, trying Ghostscript profiles, then QPDF, then LibreOffice
  pdftools compress report.pdf -o report.small.pdf

  # Keep pages 1-3 and 7
  pdftools split report.pdf --pages 1-3,7 -o excerpt.pdf

  # Merge in order
  pdftools merge a.pdf b.pdf c.pdf -o all.pdf

  # Password-protect
  pdftools encrypt report.pdf --password s3cret -o locked.pdf

  # Word to PDF and back to an editable DOCX
  pdftools word-to-pdf letter.docx -o letter.pdf
  pdftools pdf-to-docx scan.pdf -o scan.docx

  # Summarise with DeepSeek, structured JSON included
  DEEPSEEK_API_KEY=sk-... pdftools summarize manual.pdf --mode rich --format json+markdown --json

  # Summarise without any network access
  pdftools summarize manual.pdf --offline

  # Stream a completion token by token
  pdftools generate "Explain PDF linearization" --stream

  # Which engines are installed?
  pdftools engines

ENGINES:
  Ghostscript   compress (3 profiles), split, merge, text fallback
  QPDF          compress, split, merge, encrypt, page count
  LibreOffice   last-resort compress, Word → PDF, PDF → DOCX
  pdftk         encrypt
  poppler       pdftotext (text), pdfinfo (page count)

ENVIRONMENT VARIABLES:
  LLM_PROVIDER        deepseek (default), cohere, or any edgequake-llm provider
  LLM_MODEL           Override model ID (deepseek-chat, command-light, …)
  DEEPSEEK_API_KEY    DeepSeek API key
  COHERE_API_KEY      Cohere API key
  LLM_BASE_URL        Override the provider base URL
  MAX_PAGES           Summarization page limit (default 15)
  MAX_PDF_MB          Summarization size limit in MB (default 10)
  PDFTOOLS_GS         Ghostscript binary to try first
  PDFTOOLS_QPDF       QPDF binary to try first
  PDFTOOLS_SOFFICE    LibreOffice binary to try first
  PDFTOOLS_PDFTK      pdftk binary to try first
  RUST_LOG            Tracing filter (overrides --verbose/--quiet)
"#;

/// Compress, split, merge, convert and summarise PDFs with external engines and LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdftools",
    version,
    about = "Compress, split, merge, convert and summarise PDFs with external engines and LLMs",
    long_about = "Compress, split, merge and encrypt PDF documents by cascading through \
Ghostscript, QPDF, LibreOffice and pdftk, convert Word documents to and from PDF, and summarise them with DeepSeek, Cohere or any \
provider supported by edgequake-llm, with a deterministic offline fallback.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    engines: EngineArgs,

    /// Print results as JSON.
    #[arg(long, global = true, env = "PDFTOOLS_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFTOOLS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFTOOLS_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PDFTOOLS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Ghostscript binary tried before the defaults.
    #[arg(long, global = true, env = "PDFTOOLS_GS")]
    gs: Option<String>,

    /// QPDF binary tried before the defaults.
    #[arg(long, global = true, env = "PDFTOOLS_QPDF")]
    qpdf: Option<String>,

    /// LibreOffice binary tried before the defaults.
    #[arg(long, global = true, env = "PDFTOOLS_SOFFICE")]
    soffice: Option<String>,

    /// pdftk binary tried before the defaults.
    #[arg(long, global = true, env = "PDFTOOLS_PDFTK")]
    pdftk: Option<String>,

    /// Seconds every engine may run, replacing the built-in timeouts.
    #[arg(long, global = true, env = "PDFTOOLS_ENGINE_TIMEOUT")]
    engine_timeout: Option<u64>,

    /// Parent directory for per-call scratch directories.
    #[arg(long, global = true, env = "PDFTOOLS_WORK_DIR")]
    work_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM provider: deepseek, cohere, openai, anthropic, gemini, ollama, auto, …
    #[arg(long, env = "LLM_PROVIDER", default_value = "deepseek")]
    provider: String,

    /// Model ID. Default depends on the provider.
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// API key; defaults to DEEPSEEK_API_KEY or COHERE_API_KEY.
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "DEEPSEEK_API_KEY", hide = true, hide_env_values = true)]
    deepseek_api_key: Option<String>,

    #[arg(long, env = "COHERE_API_KEY", hide = true, hide_env_values = true)]
    cohere_api_key: Option<String>,

    /// Provider base URL (proxies, compatible gateways).
    #[arg(long, env = "LLM_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = 60)]
    llm_timeout: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reduce file size through the compression cascade.
    Compress {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Keep a page selection such as 1-3,5,7-10.
    Split {
        input: PathBuf,
        #[arg(long)]
        pages: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Concatenate two or more PDFs in order.
    Merge {
        #[arg(num_args = 2.., required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Protect a PDF with a user password.
    Encrypt {
        input: PathBuf,
        #[arg(long, env = "PDFTOOLS_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert a Word document (.docx or .doc) to PDF with LibreOffice.
    WordToPdf {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert a PDF to an editable DOCX with LibreOffice.
    PdfToDocx {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Summarise a PDF (or a .txt/.md file) with chunk-and-reduce.
    Summarize {
        input: PathBuf,
        /// executive or rich.
        #[arg(long, default_value = "executive")]
        mode: SummaryMode,
        /// markdown or json+markdown.
        #[arg(long, default_value = "markdown")]
        format: ReturnFormat,
        /// Soft word budget per chunk.
        #[arg(long, env = "SUMMARY_TARGET_WORDS", default_value_t = 800)]
        target_words: usize,
        /// Sentences carried into the next chunk.
        #[arg(long, env = "SUMMARY_OVERLAP", default_value_t = 2)]
        overlap: usize,
        #[arg(long, env = "MAX_PAGES", default_value_t = 15)]
        max_pages: usize,
        #[arg(long = "max-mb", env = "MAX_PDF_MB", default_value_t = 10)]
        max_mb: u64,
        /// Concurrent chunk requests.
        #[arg(short, long, env = "SUMMARY_CONCURRENCY", default_value_t = 1)]
        concurrency: usize,
        /// Skip the LLM and produce the local summary.
        #[arg(long)]
        offline: bool,
        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Generate text from a prompt.
    Generate {
        prompt: String,
        #[arg(long)]
        system: Option<String>,
        #[arg(long, default_value_t = 0.7)]
        temperature: f32,
        #[arg(long, default_value_t = 1024)]
        max_tokens: usize,
        /// Print tokens as they arrive (DeepSeek only).
        #[arg(long)]
        stream: bool,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// List the external engines and where they were found.
    Engines,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO lines would fight with the progress bar; the bar says enough.
    let show_progress =
        matches!(cli.command, Command::Summarize { .. }) && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let engines = build_engine_config(&cli.engines)?;

    match &cli.command {
        Command::Compress { input, output } => {
            let bytes = read_input(input).await?;
            let doc = compress(&bytes, &engines).await.context("Compression failed")?;
            finish_document(&cli, &doc, output).await
        }
        Command::Split { input, pages, output } => {
            let bytes = read_input(input).await?;
            let doc = split(&bytes, pages, &engines).await.context("Split failed")?;
            finish_document(&cli, &doc, output).await
        }
        Command::Merge { inputs, output } => {
            let mut files = Vec::with_capacity(inputs.len());
            for path in inputs {
                files.push(read_input(path).await?);
            }
            let refs: Vec<&[u8]> = files.iter().map(Vec::as_slice).collect();
            let doc = merge(&refs, &engines).await.context("Merge failed")?;
            finish_document(&cli, &doc, output).await
        }
        Command::Encrypt {
            input,
            password,
            output,
        } => {
            let bytes = read_input(input).await?;
            let doc = encrypt(&bytes, password, &engines)
                .await
                .context("Encryption failed")?;
            finish_document(&cli, &doc, output).await
        }
        Command::WordToPdf { input, output } => {
            let bytes = read_input(input).await?;
            let doc = word_to_pdf(&bytes, &engines).await.context("Conversion failed")?;
            finish_document(&cli, &doc, output).await
        }
        Command::PdfToDocx { input, output } => {
            let bytes = read_input(input).await?;
            let doc = pdf_to_docx(&bytes, &engines).await.context("Conversion failed")?;
            finish_document(&cli, &doc, output).await
        }
        Command::Summarize {
            input,
            mode,
            format,
            target_words,
            overlap,
            max_pages,
            max_mb,
            concurrency,
            offline,
            output,
            llm,
        } => {
            let mut builder = SummaryConfig::builder()
                .mode(*mode)
                .format(*format)
                .target_words_per_chunk(*target_words)
                .overlap_sentences(*overlap)
                .max_pages(*max_pages)
                .max_megabytes(*max_mb)
                .concurrency(*concurrency);
            if show_progress {
                let cb: ProgressCallback = CliProgressCallback::new();
                builder = builder.progress_callback(cb);
            }
            let config = builder.build().context("Invalid summary configuration")?;

            let backend = if *offline {
                None
            } else {
                match resolve_backend(&build_llm_config(llm)?) {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        warn!("{e}");
                        if !cli.quiet && !show_progress {
                            eprintln!("{} LLM not configured; using the offline summary", cyan("⚠"));
                        }
                        None
                    }
                }
            };

            let result = if is_text_file(input) {
                let text = tokio::fs::read_to_string(input)
                    .await
                    .with_context(|| format!("Failed to read {}", input.display()))?;
                summarize_text(&text, backend.as_deref(), &config).await
            } else {
                let bytes = read_input(input).await?;
                summarize_pdf(&bytes, &engines, backend.as_deref(), &config).await
            }
            .context("Summarization failed")?;

            print_summary(&cli, &result, output.as_deref()).await
        }
        Command::Generate {
            prompt,
            system,
            temperature,
            max_tokens,
            stream,
            llm,
        } => {
            let backend = resolve_backend(&build_llm_config(llm)?).context("LLM provider unavailable")?;
            let mut request = GenerateRequest::new(prompt.as_str())
                .temperature(*temperature)
                .max_tokens(*max_tokens);
            if let Some(system) = system {
                request = request.system(system.as_str());
            }
            if *stream {
                stream_to_stdout(backend.as_ref(), &request).await
            } else {
                let text = generate(backend.as_ref(), &request)
                    .await
                    .context("Generation failed")?;
                if cli.json {
                    println!("{}", serde_json::json!({ "text": text }));
                } else {
                    println!("{text}");
                }
                Ok(())
            }
        }
        Command::Engines => print_engines(&cli, &engines).await,
    }
}

/// Map engine flags onto `EngineConfig`.
fn build_engine_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut builder = EngineConfig::builder();
    let preferred = [
        (Engine::Ghostscript, &args.gs),
        (Engine::Qpdf, &args.qpdf),
        (Engine::LibreOffice, &args.soffice),
        (Engine::Pdftk, &args.pdftk),
    ];
    for (engine, path) in preferred {
        if let Some(path) = path {
            builder = builder.prefer(engine, path.as_str());
        }
    }
    if let Some(secs) = args.engine_timeout {
        builder = builder.timeout_override(Duration::from_secs(secs));
    }
    if let Some(dir) = &args.work_dir {
        builder = builder.work_dir(dir);
    }
    builder.build().context("Invalid engine configuration")
}

/// Map provider flags onto `LlmConfig`.
fn build_llm_config(args: &LlmArgs) -> Result<LlmConfig> {
    let provider = args.provider.trim().to_ascii_lowercase();
    let key = args.api_key.clone().or_else(|| match provider.as_str() {
        "deepseek" => args.deepseek_api_key.clone(),
        "cohere" => args.cohere_api_key.clone(),
        _ => None,
    });

    let mut builder = LlmConfig::builder()
        .provider(provider)
        .timeout_secs(args.llm_timeout);
    if let Some(model) = &args.model {
        builder = builder.model(model.as_str());
    }
    if let Some(key) = key {
        builder = builder.api_key(key);
    }
    if let Some(url) = &args.base_url {
        builder = builder.base_url(url.as_str());
    }
    builder.build().context("Invalid LLM configuration")
}

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "txt" | "md" | "markdown"))
}

/// Write the artifact and report the cascade.
async fn finish_document(cli: &Cli, doc: &ProcessedDocument, output: &Path) -> Result<()> {
    doc.write_to(output).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(doc).context("Failed to serialise result")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    for attempt in &doc.attempts {
        match &attempt.error {
            None => eprintln!("  {} {}", green("✓"), attempt.engine),
            Some(e) => eprintln!("  {} {}  {}", red("✗"), attempt.engine, dim(&e.to_string())),
        }
    }
    let status = if doc.is_degraded() { cyan("⚠") } else { green("✔") };
    let shrunk = if doc.output_size <= doc.original_size {
        format!("  ({:.1}% smaller)", doc.reduction_percent)
    } else {
        String::new()
    };
    eprintln!(
        "{}  {}  {} → {} bytes{}  →  {}",
        status,
        bold(&doc.engine),
        doc.original_size,
        doc.output_size,
        shrunk,
        bold(&output.display().to_string()),
    );
    Ok(())
}

async fn print_summary(cli: &Cli, result: &SummaryResult, output: Option<&Path>) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(result).context("Failed to serialise summary")?
        );
    } else if let Some(path) = output {
        tokio::fs::write(path, &result.markdown)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(result.markdown.as_bytes())
            .context("Failed to write to stdout")?;
        if !result.markdown.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        let strategy = match result.strategy {
            Strategy::Llm => result.provider.clone().unwrap_or_else(|| "llm".into()),
            Strategy::OfflineFallback => "offline fallback".into(),
        };
        eprintln!(
            "{}",
            dim(&format!(
                "{} pages  ·  {} chunks  ·  {}  ·  {:.1}s",
                result.page_count, result.chunk_count, strategy, result.elapsed_secs
            ))
        );
    }
    Ok(())
}

/// Print tokens as they arrive; Ctrl-C stops reading upstream.
async fn stream_to_stdout(backend: &dyn LlmBackend, request: &GenerateRequest) -> Result<()> {
    let tokens = generate_stream(backend, request)
        .await
        .context("Streaming generation failed")?;
    let (tx, mut rx) = mpsc::channel(32);
    let pump = tokio::spawn(forward(tokens, tx));

    let stdout = io::stdout();
    let outcome = loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(Ok(bytes)) => {
                    let mut handle = stdout.lock();
                    handle.write_all(&bytes).context("Failed to write to stdout")?;
                    handle.flush().ok();
                }
                Some(Err(e)) => break Err(anyhow::Error::new(e).context("Stream interrupted")),
                None => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n{}", dim("interrupted"));
                break Ok(());
            }
        }
    };

    drop(rx);
    pump.await.ok();
    println!();
    outcome
}

async fn print_engines(cli: &Cli, engines: &EngineConfig) -> Result<()> {
    let report = engine_report(engines).await;

    if cli.json {
        let rows: Vec<_> = report
            .iter()
            .map(|(engine, path)| serde_json::json!({ "engine": engine, "path": path }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to serialise engine report")?
        );
        return Ok(());
    }

    for (engine, path) in &report {
        match path {
            Some(p) => println!("{} {:<12} {}", green("✓"), engine.label(), p.display()),
            None => println!("{} {:<12} {}", red("✗"), engine.label(), dim("not found")),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_subcommands_parse() {
        let cli = Cli::try_parse_from(["pdftools", "word-to-pdf", "letter.docx", "-o", "letter.pdf"]).unwrap();
        assert!(matches!(cli.command, Command::WordToPdf { ref input, .. } if input == Path::new("letter.docx")));

        let cli = Cli::try_parse_from(["pdftools", "pdf-to-docx", "scan.pdf", "--output", "scan.docx"]).unwrap();
        assert!(matches!(cli.command, Command::PdfToDocx { ref output, .. } if output == Path::new("scan.docx")));
    }

    #[test]
    fn conversion_needs_an_output() {
        assert!(Cli::try_parse_from(["pdftools", "pdf-to-docx", "scan.pdf"]).is_err());
    }
}
