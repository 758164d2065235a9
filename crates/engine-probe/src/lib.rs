//! # engine-probe
//!
//! Locate an installed external engine (Ghostscript, QPDF, LibreOffice, pdftk,
//! poppler, …) before handing it real work.
//!
//! ## How it works
//!
//! [`locate`] walks a [`ProbeSpec`] in order:
//!
//! 1. Each candidate command (a bare name resolved through `PATH`, or an
//!    absolute path) is invoked with a cheap capability check such as
//!    `--version`. The first one that exits successfully within the timeout
//!    wins.
//! 2. If no candidate answers, each [`InstallScan`] lists a vendor install
//!    root (e.g. `C:\Program Files\gs`) and tries the versioned
//!    subdirectories newest first, returning the first binary that exists.
//!
//! Absence is an ordinary outcome: [`locate`] returns `None` and never errors.
//! [`require`] is a thin wrapper for callers that prefer a `Result`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engine_probe::{locate, ProbeSpec};
//!
//! # async fn demo() {
//! let spec = ProbeSpec::new("ghostscript", ["gs"]);
//! match locate(&spec).await {
//!     Some(path) => println!("ghostscript at {}", path.display()),
//!     None => println!("ghostscript not installed"),
//! }
//! # }
//! ```
//!
//! The crate reads no environment variables. Operators who want to pin a
//! specific binary put its absolute path first in the candidate list.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

// ── Public constants ─────────────────────────────────────────────────────────

/// Upper bound for a single capability check.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by [`require`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// None of the candidates answered and no install directory held the binary.
    #[error("{label} not found (tried: {})", tried.join(", "))]
    NotFound { label: String, tried: Vec<String> },
}

// ── Probe description ────────────────────────────────────────────────────────

/// A vendor install root whose subdirectories are named after versions.
///
/// `roots` are scanned in order; inside each root the subdirectories are
/// visited newest version first and `binary` is joined onto each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallScan {
    pub roots: Vec<PathBuf>,
    pub binary: PathBuf,
}

impl InstallScan {
    pub fn new(
        roots: impl IntoIterator<Item = impl Into<PathBuf>>,
        binary: impl Into<PathBuf>,
    ) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            binary: binary.into(),
        }
    }

    /// Return the newest `<root>/<version>/<binary>` that exists on disk.
    pub async fn find(&self) -> Option<PathBuf> {
        for root in &self.roots {
            let Ok(mut entries) = tokio::fs::read_dir(root).await else {
                continue;
            };

            let mut versions: Vec<String> = Vec::new();
            while let Ok(Some(entry)) = entries.next_entry().await {
                // follows symlinked version directories
                if tokio::fs::metadata(entry.path()).await.is_ok_and(|m| m.is_dir()) {
                    versions.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            versions.sort_by(|a, b| compare_versions(b, a));

            for version in versions {
                let candidate = root.join(&version).join(&self.binary);
                if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
                    debug!("Found {} via install scan", candidate.display());
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// Everything needed to look for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    /// Human-readable engine name used in logs and errors.
    pub label: String,
    /// Commands or absolute paths, tried in order.
    pub commands: Vec<String>,
    /// Arguments for the capability check. Default: `--version`.
    pub version_args: Vec<String>,
    /// Install directories scanned after every command failed.
    pub install_scans: Vec<InstallScan>,
    /// Timeout for each capability check. Default: [`DEFAULT_PROBE_TIMEOUT`].
    pub timeout: Duration,
}

impl ProbeSpec {
    pub fn new(
        label: impl Into<String>,
        commands: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            label: label.into(),
            commands: commands.into_iter().map(Into::into).collect(),
            version_args: vec!["--version".to_string()],
            install_scans: Vec::new(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn version_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.version_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn install_scan(mut self, scan: InstallScan) -> Self {
        self.install_scans.push(scan);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every location this spec would try, for error reporting.
    pub fn tried(&self) -> Vec<String> {
        let mut tried = self.commands.clone();
        for scan in &self.install_scans {
            for root in &scan.roots {
                tried.push(root.join("*").join(&scan.binary).display().to_string());
            }
        }
        tried
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Find the first working binary described by `spec`, or `None`.
pub async fn locate(spec: &ProbeSpec) -> Option<PathBuf> {
    for command in &spec.commands {
        if responds(command, &spec.version_args, spec.timeout).await {
            debug!("{}: using '{}'", spec.label, command);
            return Some(PathBuf::from(command));
        }
    }

    for scan in &spec.install_scans {
        if let Some(found) = scan.find().await {
            return Some(found);
        }
    }
    debug!("{}: not found", spec.label);
    None
}

/// Like [`locate`] but reports absence as [`ProbeError::NotFound`].
pub async fn require(spec: &ProbeSpec) -> Result<PathBuf, ProbeError> {
    locate(spec).await.ok_or_else(|| ProbeError::NotFound {
        label: spec.label.clone(),
        tried: spec.tried(),
    })
}

/// Order two directory names by their numeric components, then lexically.
///
/// `"10.02.1"` sorts after `"9.56.1"`, and `"gs10.0"` after `"gs9.27"`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    version_key(a)
        .cmp(&version_key(b))
        .then_with(|| a.cmp(b))
}

// ── Internal helpers ─────────────────────────────────────────────────────────

async fn responds(command: &str, args: &[String], timeout: Duration) -> bool {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.status()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!("'{}' did not start: {}", command, e);
            false
        }
        Err(_) => {
            debug!("'{}' did not answer within {:?}", command, timeout);
            false
        }
    }
}

fn version_key(name: &str) -> Vec<u64> {
    name.split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("10.02.1", "9.56.1"), Ordering::Greater);
        assert_eq!(compare_versions("gs9.27", "gs10.0"), Ordering::Less);
        assert_eq!(compare_versions("9.5", "9.5"), Ordering::Equal);
        // no digits at all: lexical tiebreak
        assert_eq!(compare_versions("beta", "alpha"), Ordering::Greater);
    }

    #[tokio::test]
    async fn install_scan_prefers_newest_version() {
        let root = tempfile::tempdir().unwrap();
        for version in ["9.56.1", "10.02.1", "9.27"] {
            let bin = root.path().join(version).join("bin");
            std::fs::create_dir_all(&bin).unwrap();
            std::fs::write(bin.join("gswin64c.exe"), b"").unwrap();
        }

        let scan = InstallScan::new([root.path()], PathBuf::from("bin").join("gswin64c.exe"));
        let found = scan.find().await.expect("a binary should be found");
        assert!(found.starts_with(root.path().join("10.02.1")), "got {found:?}");
    }

    #[tokio::test]
    async fn install_scan_skips_versions_without_binary() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("10.0").join("bin")).unwrap();
        let old = root.path().join("9.0").join("bin");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::write(old.join("gs"), b"").unwrap();

        let scan = InstallScan::new([root.path()], PathBuf::from("bin").join("gs"));
        assert_eq!(scan.find().await, Some(old.join("gs")));
    }

    #[tokio::test]
    async fn install_scan_missing_root_is_none() {
        let scan = InstallScan::new(["/definitely/not/here"], "gs");
        assert_eq!(scan.find().await, None);
    }

    #[tokio::test]
    async fn locate_falls_back_to_install_scan() {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("10.02.1").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("gs"), b"").unwrap();
        // a plain file beside the version directories is ignored
        std::fs::write(root.path().join("README"), b"").unwrap();

        let spec = ProbeSpec::new("Ghostscript", ["/definitely/not/here/gs"])
            .install_scan(InstallScan::new([root.path()], PathBuf::from("bin").join("gs")));
        assert_eq!(locate(&spec).await, Some(bin.join("gs")));
    }

    #[tokio::test]
    async fn locate_missing_command_is_none() {
        let spec = ProbeSpec::new("nothing", ["pdftools-no-such-binary-xyz"]);
        assert_eq!(locate(&spec).await, None);
    }

    #[tokio::test]
    async fn require_reports_every_candidate() {
        let spec = ProbeSpec::new("nothing", ["first-missing", "second-missing"]);
        let err = require(&spec).await.unwrap_err();
        let ProbeError::NotFound { label, tried } = err;
        assert_eq!(label, "nothing");
        assert_eq!(tried, vec!["first-missing", "second-missing"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn locate_accepts_first_responding_command() {
        let spec = ProbeSpec::new("shell", ["pdftools-no-such-binary-xyz", "sh"])
            .version_args(["-c", "exit 0"]);
        assert_eq!(locate(&spec).await, Some(PathBuf::from("sh")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn locate_rejects_failing_capability_check() {
        let spec = ProbeSpec::new("shell", ["sh"]).version_args(["-c", "exit 3"]);
        assert_eq!(locate(&spec).await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn locate_times_out_slow_command() {
        let spec = ProbeSpec::new("slow", ["sh"])
            .version_args(["-c", "sleep 5"])
            .timeout(Duration::from_millis(100));
        assert_eq!(locate(&spec).await, None);
    }
}
