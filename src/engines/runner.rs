//! Subprocess execution with a hard timeout.

use crate::error::AttemptError;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Longest stderr excerpt kept in an [`AttemptError::Exit`].
const STDERR_EXCERPT: usize = 500;

/// Run `program` in `cwd` and return its stdout.
///
/// The child is killed when the timeout fires (`kill_on_drop`). A non-zero
/// exit becomes [`AttemptError::Exit`] with the tail of stderr.
pub async fn run(
    program: &Path,
    args: &[String],
    cwd: &Path,
    timeout: Duration,
) -> Result<Vec<u8>, AttemptError> {
    debug!("exec {} {}", program.display(), args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => {
            return Err(AttemptError::Timeout {
                secs: timeout.as_secs().max(1),
            })
        }
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => return Err(AttemptError::NotFound),
        Ok(Err(e)) => return Err(AttemptError::Io(e.to_string())),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        return Err(AttemptError::Exit {
            code: output.status.code(),
            stderr: excerpt(&String::from_utf8_lossy(&output.stderr)),
        });
    }
    Ok(output.stdout)
}

fn excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_EXCERPT {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(count - STDERR_EXCERPT).collect();
    format!("…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_tail() {
        let long = "x".repeat(600) + "END";
        let e = excerpt(&long);
        assert!(e.starts_with('…'));
        assert!(e.ends_with("END"));
        assert_eq!(e.chars().count(), STDERR_EXCERPT + 1);
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            Path::new("pdftools-no-such-engine"),
            &[],
            dir.path(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert_eq!(err, AttemptError::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(
            Path::new("sh"),
            &["-c".into(), "printf 42".into()],
            dir.path(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(out, b"42");

        let err = run(
            Path::new("sh"),
            &["-c".into(), "echo boom >&2; exit 2".into()],
            dir.path(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            AttemptError::Exit {
                code: Some(2),
                stderr: "boom".into()
            }
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_program_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            Path::new("sh"),
            &["-c".into(), "sleep 5".into()],
            dir.path(),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AttemptError::Timeout { .. }));
    }
}
