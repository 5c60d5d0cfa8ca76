//! Post-import hooks
//!
//! Every executable regular file in the hooks directory is run, in name
//! order, with the imported file's archive path as its only argument.
//! A failing hook is logged and never stops the others.

use crate::services::process_runner::ProcessRunner;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Outcome counts for one hook run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookReport {
    pub ran: usize,
    pub failed: usize,
}

/// Runs hooks discovered in a directory
pub struct HookRunner {
    runner: Arc<dyn ProcessRunner>,
    hooks_dir: Option<PathBuf>,
    timeout: Duration,
}

impl HookRunner {
    pub fn new(runner: Arc<dyn ProcessRunner>, hooks_dir: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            runner,
            hooks_dir,
            timeout,
        }
    }

    /// Hooks currently present, sorted by file name
    ///
    /// Rescanned on every call so hooks can be added without a restart.
    pub fn discover(&self) -> Vec<PathBuf> {
        let Some(dir) = &self.hooks_dir else {
            return Vec::new();
        };

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(hooks_dir = %dir.display(), error = %e, "Cannot read hooks directory");
                return Vec::new();
            }
        };

        let mut hooks: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                if is_executable_file(path) {
                    true
                } else {
                    tracing::debug!(hook = %path.display(), "Skipping non-executable hook entry");
                    false
                }
            })
            .collect();
        hooks.sort();
        hooks
    }

    /// Run all hooks for one imported file
    pub async fn run_all(&self, imported: &Path) -> HookReport {
        let mut report = HookReport::default();

        for hook in self.discover() {
            let hook_name = hook
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| hook.display().to_string());
            let args: Vec<OsString> = vec![imported.as_os_str().to_os_string()];

            report.ran += 1;
            match self.runner.run(&hook, &args, self.timeout).await {
                Ok(output) if output.success() => {
                    tracing::info!(hook = %hook_name, file = %imported.display(), "Ran hook");
                }
                Ok(output) => {
                    report.failed += 1;
                    tracing::error!(
                        hook = %hook_name,
                        file = %imported.display(),
                        exit_code = ?output.exit_code,
                        stderr = %output.stderr.trim(),
                        "Hook failed"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(hook = %hook_name, file = %imported.display(), error = %e, "Hook failed");
                }
            }
        }

        report
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::services::process_runner::{ProcessOutput, ToolError, TokioProcessRunner};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_hook(dir: &Path, name: &str, script: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    fn runner(dir: Option<PathBuf>) -> HookRunner {
        HookRunner::new(Arc::new(TokioProcessRunner::new()), dir, Duration::from_secs(5))
    }

    #[test]
    fn test_no_hooks_dir_means_no_hooks() {
        assert!(runner(None).discover().is_empty());
        assert!(runner(Some(PathBuf::from("/nonexistent/hooks"))).discover().is_empty());
    }

    #[test]
    fn test_discover_skips_non_executables_and_sorts() {
        let dir = TempDir::new().unwrap();
        write_hook(dir.path(), "20-backup.sh", "#!/bin/sh\n", 0o755);
        write_hook(dir.path(), "10-tag.sh", "#!/bin/sh\n", 0o755);
        write_hook(dir.path(), "README", "docs", 0o644);
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let hooks = runner(Some(dir.path().to_path_buf())).discover();
        let names: Vec<_> = hooks
            .iter()
            .map(|h| h.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["10-tag.sh", "20-backup.sh"]);
    }

    /// Records invocations; hooks whose name contains "fail" exit 1
    struct RecordingRunner {
        calls: std::sync::Mutex<Vec<(PathBuf, Vec<OsString>)>>,
    }

    #[async_trait::async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn run(
            &self,
            program: &Path,
            args: &[OsString],
            _timeout: Duration,
        ) -> Result<ProcessOutput, ToolError> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_path_buf(), args.to_vec()));
            let failed = program
                .file_name()
                .map(|n| n.to_string_lossy().contains("fail"))
                .unwrap_or(false);
            Ok(ProcessOutput {
                exit_code: Some(if failed { 1 } else { 0 }),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        write_hook(dir.path(), "10-fail.sh", "#!/bin/sh\nexit 1\n", 0o755);
        write_hook(dir.path(), "20-record.sh", "#!/bin/sh\n", 0o755);

        let recording = Arc::new(RecordingRunner {
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let hooks = HookRunner::new(
            recording.clone(),
            Some(dir.path().to_path_buf()),
            Duration::from_secs(5),
        );

        let report = hooks.run_all(Path::new("/archive/2024/03-07/IMG_01.JPG")).await;
        assert_eq!(report, HookReport { ran: 2, failed: 1 });

        let calls = recording.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].0.ends_with("20-record.sh"));
        assert_eq!(calls[1].1, vec![OsString::from("/archive/2024/03-07/IMG_01.JPG")]);
    }
}
