//! The generic cascade: try each candidate in order, accept the first
//! artifact that meets its policy.
//!
//! ## Scratch layout
//!
//! ```text
//! <tmp>/comp-XXXXXX/          one TempDir per call, prefixed per operation
//!  ├─ input.pdf               (input-1.pdf, … for merge; input.docx for Word)
//!  ├─ attempt-1/output.pdf    removed as soon as the attempt is rejected
//!  └─ attempt-2/output.pdf
//! ```
//!
//! The whole directory is removed when the `TempDir` drops, on success and
//! on every error path.

use super::candidates::{render_args, Acceptance, EngineCandidate, OutputTarget, TemplateValues};
use super::{Operation, ORIGINAL_ENGINE};
use crate::config::{Engine, EngineConfig};
use crate::error::{AttemptError, PdfToolsError};
use crate::output::{ConversionOutcome, ProcessedDocument};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One concrete engine call.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub candidate: &'a EngineCandidate,
    pub program: &'a Path,
    pub args: Vec<String>,
    /// Working directory; also `{outdir}`.
    pub attempt_dir: &'a Path,
    /// Where the artifact is expected, for file outputs.
    pub output_path: Option<PathBuf>,
    pub timeout: Duration,
}

/// The seam between the cascade and the outside world.
///
/// Production uses [`super::SystemInvoker`]; tests substitute fakes.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Resolve an engine to a runnable program, or `None` when absent.
    async fn locate(&self, engine: Engine) -> Option<PathBuf>;

    /// Run one invocation and return its stdout.
    async fn invoke(&self, call: &Invocation<'_>) -> Result<Vec<u8>, AttemptError>;
}

/// Operation parameters substituted into templates.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub pages: Option<String>,
    pub password: Option<String>,
}

/// Percent size reduction, one decimal place, never negative.
pub fn reduction_percent(original: u64, output: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let raw = (original as f64 - output as f64) / original as f64 * 100.0;
    ((raw * 10.0).round() / 10.0).max(0.0)
}

fn raw_reduction(original: u64, output: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - output as f64) / original as f64 * 100.0
}

/// Run `candidates` for `operation` over `inputs`.
///
/// Returns the first accepted artifact. When every candidate fails:
/// - compress returns the input unchanged (engine `original`, 0%) if at
///   least one artifact was produced and rejected by its policy;
/// - otherwise [`PdfToolsError::EngineUnavailable`] if no engine was
///   installed, else [`PdfToolsError::ProcessingFailure`].
pub async fn run_cascade(
    invoker: &dyn Invoker,
    operation: Operation,
    candidates: &[EngineCandidate],
    inputs: &[&[u8]],
    params: &Params,
    config: &EngineConfig,
) -> Result<ProcessedDocument, PdfToolsError> {
    let original_size: u64 = inputs.iter().map(|i| i.len() as u64).sum();
    info!(
        "{}: {} input(s), {} bytes, {} candidate(s)",
        operation,
        inputs.len(),
        original_size,
        candidates.len()
    );

    // ── Scratch directory ────────────────────────────────────────────────
    let mut builder = tempfile::Builder::new();
    builder.prefix(operation.temp_prefix());
    let work = match &config.work_dir {
        Some(dir) => builder.tempdir_in(dir)?,
        None => builder.tempdir()?,
    };

    let input_paths = write_inputs(work.path(), inputs, operation).await?;
    let values = TemplateValues {
        inputs: input_paths.iter().map(|p| p.display().to_string()).collect(),
        output: String::new(),
        outdir: String::new(),
        pages: params.pages.clone(),
        password: params.password.clone(),
    };

    // ── Cascade ──────────────────────────────────────────────────────────
    let mut located: HashMap<Engine, Option<PathBuf>> = HashMap::new();
    let mut attempts: Vec<ConversionOutcome> = Vec::with_capacity(candidates.len());

    for (i, candidate) in candidates.iter().enumerate() {
        if !located.contains_key(&candidate.engine) {
            let found = invoker.locate(candidate.engine).await;
            located.insert(candidate.engine, found);
        }
        let Some(program) = located.get(&candidate.engine).cloned().flatten() else {
            debug!("{}: {} not installed", operation, candidate.name);
            attempts.push(ConversionOutcome::failed(&candidate.name, 0, 0.0, AttemptError::NotFound));
            continue;
        };

        let attempt_dir = work.path().join(format!("attempt-{}", i + 1));
        tokio::fs::create_dir_all(&attempt_dir).await?;

        match attempt(invoker, candidate, &program, &attempt_dir, &values, original_size, config).await {
            Ok((bytes, outcome)) => {
                info!(
                    "{}: accepted {} ({} → {} bytes, {:.1}%)",
                    operation,
                    candidate.name,
                    original_size,
                    outcome.output_size,
                    outcome.reduction_percent
                );
                let output_size = outcome.output_size;
                let reduction = outcome.reduction_percent;
                attempts.push(outcome);
                return Ok(ProcessedDocument {
                    bytes,
                    engine: candidate.name.clone(),
                    original_size,
                    output_size,
                    reduction_percent: reduction,
                    attempts,
                });
            }
            Err(outcome) => {
                if let Some(err) = &outcome.error {
                    warn!("{}: {} rejected: {}", operation, candidate.name, err);
                }
                attempts.push(outcome);
                // Removal failures are harmless; the TempDir sweeps the rest.
                let _ = tokio::fs::remove_dir_all(&attempt_dir).await;
            }
        }
    }

    // ── Nothing accepted ─────────────────────────────────────────────────
    let any_rejected = attempts
        .iter()
        .any(|a| a.error.as_ref().is_some_and(AttemptError::is_rejection));

    if operation.allows_degraded() && any_rejected {
        warn!("{}: no candidate met its threshold, returning the original", operation);
        let bytes = inputs.concat();
        return Ok(ProcessedDocument {
            bytes,
            engine: ORIGINAL_ENGINE.to_string(),
            original_size,
            output_size: original_size,
            reduction_percent: 0.0,
            attempts,
        });
    }

    let none_installed = attempts
        .iter()
        .all(|a| matches!(a.error, Some(AttemptError::NotFound)));
    if none_installed {
        let mut tried: Vec<String> = Vec::new();
        for c in candidates {
            let label = c.engine.label().to_string();
            if !tried.contains(&label) {
                tried.push(label);
            }
        }
        return Err(PdfToolsError::EngineUnavailable {
            operation: operation.to_string(),
            tried,
        });
    }

    let detail = attempts
        .iter()
        .filter_map(|a| a.error.as_ref().map(|e| format!("{}: {}", a.engine, e)))
        .collect::<Vec<_>>()
        .join("; ");
    Err(PdfToolsError::ProcessingFailure {
        operation: operation.to_string(),
        detail,
    })
}

/// Run one candidate. `Err` carries the failed outcome.
async fn attempt(
    invoker: &dyn Invoker,
    candidate: &EngineCandidate,
    program: &Path,
    attempt_dir: &Path,
    values: &TemplateValues,
    original_size: u64,
    config: &EngineConfig,
) -> Result<(Vec<u8>, ConversionOutcome), ConversionOutcome> {
    let fail = |size: u64, error: AttemptError| {
        ConversionOutcome::failed(&candidate.name, size, reduction_percent(original_size, size), error)
    };

    let output_path = match &candidate.output {
        OutputTarget::File(name) => Some(attempt_dir.join(name)),
        OutputTarget::Stdout => None,
    };
    let mut values = values.clone();
    values.output = output_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    values.outdir = attempt_dir.display().to_string();

    let call = Invocation {
        candidate,
        program,
        args: render_args(&candidate.args, &values),
        attempt_dir,
        output_path: output_path.clone(),
        timeout: config.timeout_override.unwrap_or(candidate.timeout),
    };

    let mut stdout = invoker.invoke(&call).await.map_err(|e| fail(0, e))?;
    for step in &candidate.then {
        let next = Invocation {
            args: render_args(step, &values),
            output_path: output_path.clone(),
            ..call
        };
        stdout = invoker.invoke(&next).await.map_err(|e| fail(0, e))?;
    }

    // ── Collect the artifact ─────────────────────────────────────────────
    let bytes = match output_path {
        Some(path) => match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(fail(0, AttemptError::MissingOutput))
            }
            Err(e) => return Err(fail(0, AttemptError::Io(e.to_string()))),
        },
        None => stdout,
    };
    let size = bytes.len() as u64;
    if candidate.acceptance != Acceptance::AnyOutput && bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(fail(size, AttemptError::EmptyOutput));
    }

    // ── Acceptance ───────────────────────────────────────────────────────
    let raw = raw_reduction(original_size, size);
    match candidate.acceptance {
        Acceptance::FirstArtifact => {}
        Acceptance::MinReduction(required) if raw < required => {
            return Err(fail(
                size,
                AttemptError::BelowThreshold {
                    reduction: raw.max(0.0),
                    required,
                },
            ));
        }
        Acceptance::MinReduction(_) => {}
        Acceptance::NotLarger if size > original_size => {
            return Err(fail(
                size,
                AttemptError::Grew {
                    original: original_size,
                    output: size,
                },
            ));
        }
        Acceptance::NotLarger => {}
        Acceptance::AnyOutput => {}
    }

    let outcome = ConversionOutcome::accepted(&candidate.name, size, reduction_percent(original_size, size));
    Ok((bytes, outcome))
}

async fn write_inputs(dir: &Path, inputs: &[&[u8]], operation: Operation) -> Result<Vec<PathBuf>, PdfToolsError> {
    let mut paths = Vec::with_capacity(inputs.len());
    for (i, bytes) in inputs.iter().enumerate() {
        let ext = operation.input_extension(bytes);
        let name = if inputs.len() == 1 {
            format!("input.{ext}")
        } else {
            format!("input-{}.{ext}", i + 1)
        };
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        paths.push(path);
    }
    Ok(paths)
}
