//! Copy, verify and commit a single file into the archive
//!
//! The copy is written to a hidden `.partial` sibling of the destination,
//! verified against the source fingerprint, then renamed into place. A crash
//! mid-copy therefore never leaves a truncated file under the real name;
//! its leftover `.partial` is removed the next time that name is staged.
//!
//! Hooks and the per-file notification only run after verification passes.

use crate::models::{FailureReason, Fingerprint, ImportRecord, MediaFile, ResolvedDate, SkipReason};
use crate::services::content_hasher::fingerprint_blocking;
use crate::services::hook_runner::HookRunner;
use crate::services::notifier::{notify_best_effort, Notification, Notifier};
use std::fs::{File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors inside one import attempt; each maps to a `Failed` record
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to create {0}: {1}")]
    CreateDir(PathBuf, #[source] io::Error),

    #[error("Failed to copy to {0}: {1}")]
    Copy(PathBuf, #[source] io::Error),

    #[error("Failed to move {0} into place: {1}")]
    Commit(PathBuf, #[source] io::Error),

    #[error("Zero-byte {0} file")]
    ZeroSize(&'static str),

    #[error("Checksum mismatch: expected {expected}, copied {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("Failed to hash copy: {0}")]
    HashCopy(String),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

impl ImportError {
    fn failure_reason(&self) -> FailureReason {
        match self {
            Self::ZeroSize(_) | Self::Mismatch { .. } | Self::HashCopy(_) => {
                FailureReason::Verification
            }
            Self::CreateDir(..) | Self::Copy(..) | Self::Commit(..) | Self::Task(_) => {
                FailureReason::Copy
            }
        }
    }

    fn into_record(self) -> ImportRecord {
        ImportRecord::failed(self.failure_reason(), self.to_string())
    }
}

/// A copy written to its temporary name, not yet verified
#[derive(Debug)]
pub struct StagedCopy {
    pub source: PathBuf,
    pub temp_path: PathBuf,
    pub destination: PathBuf,
}

/// Executor settings taken from the importer configuration
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Hash a pre-existing destination to tell re-imports from name collisions
    pub verify_existing: bool,
    pub notify_each_file: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            verify_existing: true,
            notify_each_file: true,
        }
    }
}

/// Imports one file at a time
pub struct ImportExecutor {
    hooks: HookRunner,
    notifier: Arc<dyn Notifier>,
    options: ExecutorOptions,
}

impl ImportExecutor {
    pub fn new(hooks: HookRunner, notifier: Arc<dyn Notifier>, options: ExecutorOptions) -> Self {
        Self {
            hooks,
            notifier,
            options,
        }
    }

    /// Import `file` to `destination`
    ///
    /// Returns `Imported` only after the copied bytes were verified.
    pub async fn execute(
        &self,
        file: &MediaFile,
        fingerprint: &Fingerprint,
        destination: &Path,
        date: ResolvedDate,
    ) -> ImportRecord {
        if destination_present(destination) {
            return self.existing_destination(file, fingerprint, destination).await;
        }

        let staged = match self.stage(file, destination).await {
            Ok(staged) => staged,
            Err(e) => {
                tracing::error!(path = %file.path.display(), error = %e, "Copy failed");
                return e.into_record();
            }
        };

        self.commit(staged, file, fingerprint, date).await
    }

    /// Step 1: the destination is already there; never overwrite it
    async fn existing_destination(
        &self,
        file: &MediaFile,
        fingerprint: &Fingerprint,
        destination: &Path,
    ) -> ImportRecord {
        let content_matches = if self.options.verify_existing {
            let existing = destination.to_path_buf();
            match tokio::task::spawn_blocking(move || fingerprint_blocking(&existing)).await {
                Ok(Ok(existing_fp)) => existing_fp == *fingerprint,
                Ok(Err(e)) => {
                    tracing::warn!(destination = %destination.display(), error = %e, "Cannot hash existing destination");
                    false
                }
                Err(e) => {
                    tracing::warn!(destination = %destination.display(), error = %e, "Hash task failed");
                    false
                }
            }
        } else {
            false
        };

        if content_matches || !self.options.verify_existing {
            tracing::warn!(
                path = %file.path.display(),
                destination = %destination.display(),
                "Skipped (already exists)"
            );
        } else {
            tracing::warn!(
                path = %file.path.display(),
                destination = %destination.display(),
                fingerprint = %fingerprint.short(),
                "Skipped: destination exists with different content (name collision)"
            );
        }

        ImportRecord::Skipped(SkipReason::DestinationExists { content_matches })
    }

    /// Step 2: create directories and copy to a temporary sibling
    ///
    /// Permissions and access/modification times follow the source.
    pub async fn stage(&self, file: &MediaFile, destination: &Path) -> Result<StagedCopy, ImportError> {
        let source = file.path.clone();
        let destination = destination.to_path_buf();

        let staged = tokio::task::spawn_blocking(move || stage_blocking(source, destination))
            .await
            .map_err(|e| ImportError::Task(e.to_string()))??;

        tracing::debug!(
            path = %staged.source.display(),
            temp = %staged.temp_path.display(),
            "Copied to temporary file"
        );
        Ok(staged)
    }

    /// Steps 3-5: verify the staged bytes, rename into place, run hooks and
    /// notify
    pub async fn commit(
        &self,
        staged: StagedCopy,
        file: &MediaFile,
        fingerprint: &Fingerprint,
        date: ResolvedDate,
    ) -> ImportRecord {
        let expected = *fingerprint;
        let result = tokio::task::spawn_blocking(move || commit_blocking(staged, expected))
            .await
            .map_err(|e| ImportError::Task(e.to_string()))
            .and_then(|r| r);

        let (destination, bytes) = match result {
            Ok(CommitOutcome::Committed { destination, bytes }) => (destination, bytes),
            Ok(CommitOutcome::DestinationAppeared { destination }) => {
                tracing::warn!(
                    path = %file.path.display(),
                    destination = %destination.display(),
                    "Destination appeared during copy; keeping existing file"
                );
                return self.existing_destination(file, fingerprint, &destination).await;
            }
            Err(e) => {
                match e.failure_reason() {
                    FailureReason::Verification => tracing::error!(
                        path = %file.path.display(),
                        error = %e,
                        "Verification failed"
                    ),
                    _ => tracing::error!(path = %file.path.display(), error = %e, "Import failed"),
                }
                return e.into_record();
            }
        };

        tracing::info!(
            path = %file.path.display(),
            destination = %destination.display(),
            bytes,
            fingerprint = %fingerprint.short(),
            "Imported and verified"
        );

        let report = self.hooks.run_all(&destination).await;
        if report.failed > 0 {
            tracing::warn!(
                destination = %destination.display(),
                failed = report.failed,
                ran = report.ran,
                "Some post-import hooks failed"
            );
        }

        if self.options.notify_each_file {
            let name = file.file_name().to_string_lossy();
            notify_best_effort(self.notifier.as_ref(), &Notification::file_imported(&name)).await;
        }

        ImportRecord::Imported {
            destination,
            bytes,
            date,
        }
    }
}

enum CommitOutcome {
    Committed { destination: PathBuf, bytes: u64 },
    DestinationAppeared { destination: PathBuf },
}

/// Existence check that does not follow symlinks
fn destination_present(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

fn temp_path_for(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_name = format!(".{}.{}.partial", name, uuid::Uuid::new_v4().simple());
    destination.with_file_name(temp_name)
}

/// Delete temporaries of `destination` left by an interrupted earlier run
///
/// Imports are sequential, so no other copy to this name is in flight.
fn remove_stale_partials(destination: &Path) {
    let (Some(dir), Some(name)) = (destination.parent(), destination.file_name()) else {
        return;
    };
    let prefix = format!(".{}.", name.to_string_lossy());
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.filter_map(Result::ok) {
        let entry_name = entry.file_name();
        let entry_name = entry_name.to_string_lossy();
        if !entry_name.starts_with(&prefix) || !entry_name.ends_with(".partial") {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => tracing::info!(path = %entry.path().display(), "Removed stale partial copy"),
            Err(e) => tracing::warn!(path = %entry.path().display(), error = %e, "Cannot remove stale partial copy"),
        }
    }
}

fn stage_blocking(source: PathBuf, destination: PathBuf) -> Result<StagedCopy, ImportError> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ImportError::CreateDir(parent.to_path_buf(), e))?;
    }

    remove_stale_partials(&destination);

    let temp_path = temp_path_for(&destination);
    let copy_result = (|| -> io::Result<()> {
        // fs::copy carries permission bits over
        std::fs::copy(&source, &temp_path)?;

        let source_meta = std::fs::metadata(&source)?;
        let mut times = FileTimes::new().set_modified(source_meta.modified()?);
        if let Ok(accessed) = source_meta.accessed() {
            times = times.set_accessed(accessed);
        }

        let copy = File::options().write(true).open(&temp_path)?;
        copy.set_times(times)?;
        copy.sync_all()
    })();

    if let Err(e) = copy_result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(ImportError::Copy(destination, e));
    }

    Ok(StagedCopy {
        source,
        temp_path,
        destination,
    })
}

fn commit_blocking(staged: StagedCopy, expected: Fingerprint) -> Result<CommitOutcome, ImportError> {
    let result = verify_staged(&staged, &expected);
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = std::fs::remove_file(&staged.temp_path);
            return Err(e);
        }
    };

    // rename() replaces silently on Unix, so re-check right before it
    if destination_present(&staged.destination) {
        let _ = std::fs::remove_file(&staged.temp_path);
        return Ok(CommitOutcome::DestinationAppeared {
            destination: staged.destination,
        });
    }

    if let Err(e) = std::fs::rename(&staged.temp_path, &staged.destination) {
        let _ = std::fs::remove_file(&staged.temp_path);
        return Err(ImportError::Commit(staged.destination, e));
    }

    Ok(CommitOutcome::Committed {
        destination: staged.destination,
        bytes,
    })
}

/// Integrity check on the bytes actually written; returns the copy's size
fn verify_staged(staged: &StagedCopy, expected: &Fingerprint) -> Result<u64, ImportError> {
    let source_len = std::fs::metadata(&staged.source)
        .map(|m| m.len())
        .map_err(|e| ImportError::HashCopy(e.to_string()))?;
    if source_len == 0 {
        return Err(ImportError::ZeroSize("source"));
    }

    let copy_len = std::fs::metadata(&staged.temp_path)
        .map(|m| m.len())
        .map_err(|e| ImportError::HashCopy(e.to_string()))?;
    if copy_len == 0 {
        return Err(ImportError::ZeroSize("destination"));
    }

    let actual = fingerprint_blocking(&staged.temp_path).map_err(|e| ImportError::HashCopy(e.to_string()))?;
    if actual != *expected {
        return Err(ImportError::Mismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    Ok(copy_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::process_runner::TokioProcessRunner;
    use std::time::Duration;

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let temp = temp_path_for(Path::new("/archive/2024/03-07/IMG_01.JPG"));
        assert_eq!(temp.parent().unwrap(), Path::new("/archive/2024/03-07"));
        let name = temp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".IMG_01.JPG."));
        assert!(name.ends_with(".partial"));
    }

    #[test]
    fn test_error_reasons() {
        assert_eq!(ImportError::ZeroSize("source").failure_reason(), FailureReason::Verification);
        assert_eq!(
            ImportError::Copy(PathBuf::from("/x"), io::Error::from(io::ErrorKind::Other)).failure_reason(),
            FailureReason::Copy
        );
    }

    #[test]
    fn test_remove_stale_partials_matches_only_own_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let destination = dir.path().join("IMG_01.JPG");
        let stale = dir.path().join(".IMG_01.JPG.5f0c2a9e61d84c1b9a1f3e7d2c4b6a80.partial");
        let other = dir.path().join(".IMG_02.JPG.5f0c2a9e61d84c1b9a1f3e7d2c4b6a80.partial");
        let unrelated = dir.path().join(".IMG_01.JPG.xmp");
        for path in [&stale, &other, &unrelated] {
            std::fs::write(path, b"half").unwrap();
        }

        remove_stale_partials(&destination);

        assert!(!stale.exists());
        assert!(other.exists());
        assert!(unrelated.exists());
        // Missing directory is not an error
        remove_stale_partials(&dir.path().join("absent/IMG_01.JPG"));
    }

    #[tokio::test]
    async fn test_stage_preserves_mtime() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("IMG_01.JPG");
        std::fs::write(&src, b"pixels").unwrap();
        let mtime = std::time::SystemTime::UNIX_EPOCH + Duration::from_secs(1_683_000_000);
        File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let file = MediaFile::from_path(&src, "CARD").unwrap().unwrap();
        let executor = ImportExecutor::new(
            HookRunner::new(Arc::new(TokioProcessRunner::new()), None, Duration::from_secs(1)),
            Arc::new(crate::services::notifier::DisabledNotifier),
            ExecutorOptions::default(),
        );
        let staged = executor
            .stage(&file, &dir.path().join("out/2023/05-02/IMG_01.JPG"))
            .await
            .unwrap();

        let copied = std::fs::metadata(&staged.temp_path).unwrap();
        assert_eq!(copied.modified().unwrap(), mtime);
        assert_eq!(std::fs::read(&staged.temp_path).unwrap(), b"pixels");
        assert!(!staged.destination.exists());
    }
}
