//! External process capability
//!
//! The metadata tool and post-import hooks both run through [`ProcessRunner`]
//! so tests can substitute a fake.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Process launch and wait errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Program not found on PATH or at the given location
    #[error("Program not found: {0}")]
    NotFound(String),

    /// Program could not be started
    #[error("Failed to spawn {0}: {1}")]
    Spawn(String, String),

    /// Program did not finish in time and was killed
    #[error("{0} timed out after {1:?}")]
    Timeout(String, Duration),

    /// Waiting on the child failed
    #[error("I/O error running {0}: {1}")]
    Io(String, String),
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external program to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &Path,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<ProcessOutput, ToolError>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<ProcessOutput, ToolError> {
        let name = program.display().to_string();

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ToolError::NotFound(name.clone()),
                _ => ToolError::Spawn(name.clone(), e.to_string()),
            })?;

        // Dropping the future on timeout kills the child (kill_on_drop)
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ToolError::Io(name.clone(), e.to_string()))?,
            Err(_) => return Err(ToolError::Timeout(name, timeout)),
        };

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let runner = TokioProcessRunner::new();
        let result = runner
            .run(
                Path::new("/nonexistent/mediasync-tool"),
                &[],
                Duration::from_secs(5),
            )
            .await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let runner = TokioProcessRunner::new();
        let output = runner
            .run(
                Path::new("sh"),
                &["-c".into(), "echo 2024:03:07; exit 3".into()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "2024:03:07");
    }

    #[tokio::test]
    async fn test_timeout_kills_slow_program() {
        let runner = TokioProcessRunner::new();
        let result = runner
            .run(
                Path::new("sh"),
                &["-c".into(), "sleep 5".into()],
                Duration::from_millis(100),
            )
            .await;
        assert!(matches!(result, Err(ToolError::Timeout(_, _))));
    }
}
