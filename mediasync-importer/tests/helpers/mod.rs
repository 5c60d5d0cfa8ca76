//! Test Helper Utilities
//!
//! Fake capabilities and card fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mediasync_common::config::NotificationSettings;
use mediasync_common::ImporterConfig;
use mediasync_importer::services::{
    Notification, NotificationKind, Notifier, NotifyError, ProcessOutput, ProcessRunner, ScanLoop,
    ToolError,
};
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const METADATA_TOOL: &str = "exiftool";

/// Process runner that answers metadata queries from a table and records
/// every invocation. Any program other than the metadata tool is treated as
/// a hook and succeeds unless registered with [`FakeRunner::fail_hook`].
pub struct FakeRunner {
    dates: Mutex<HashMap<String, String>>,
    failing_hooks: Mutex<HashSet<String>>,
    cancel_on_metadata: Mutex<Option<CancellationToken>>,
    calls: Mutex<Vec<(PathBuf, Vec<OsString>)>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dates: Mutex::new(HashMap::new()),
            failing_hooks: Mutex::new(HashSet::new()),
            cancel_on_metadata: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Hook named `hook_name` exits with status 1
    pub fn fail_hook(&self, hook_name: &str) {
        self.failing_hooks
            .lock()
            .unwrap()
            .insert(hook_name.to_string());
    }

    /// Cancel `token` on the first metadata query, i.e. while the first file
    /// of a cycle is being imported
    pub fn cancel_on_first_metadata_call(&self, token: CancellationToken) {
        *self.cancel_on_metadata.lock().unwrap() = Some(token);
    }

    /// Metadata tool prints `date` for files named `file_name`
    pub fn set_date(&self, file_name: &str, date: &str) {
        self.dates
            .lock()
            .unwrap()
            .insert(file_name.to_string(), date.to_string());
    }

    /// (hook, argument) pairs in call order
    pub fn hook_calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(program, _)| program != Path::new(METADATA_TOOL))
            .map(|(program, args)| (program.clone(), PathBuf::from(&args[0])))
            .collect()
    }

    pub fn metadata_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(program, _)| program == Path::new(METADATA_TOOL))
            .count()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
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

        if program != Path::new(METADATA_TOOL) {
            let hook_name = program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let fails = self.failing_hooks.lock().unwrap().contains(&hook_name);
            return Ok(ProcessOutput {
                exit_code: Some(if fails { 1 } else { 0 }),
                stdout: String::new(),
                stderr: if fails { "hook failed".to_string() } else { String::new() },
            });
        }

        if let Some(token) = self.cancel_on_metadata.lock().unwrap().take() {
            token.cancel();
        }

        let file_name = args
            .last()
            .and_then(|a| Path::new(a).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.dates.lock().unwrap().get(&file_name) {
            Some(date) => Ok(ProcessOutput {
                exit_code: Some(0),
                stdout: format!("{}\n", date),
                stderr: String::new(),
            }),
            None => Ok(ProcessOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "Warning: [minor] No CreateDate".to_string(),
            }),
        }
    }
}

/// Notifier that keeps everything it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Mount point, archive and hooks directory in temp space
pub struct Fixture {
    pub mount: TempDir,
    pub archive: TempDir,
    pub hooks: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            mount: TempDir::new().unwrap(),
            archive: TempDir::new().unwrap(),
            hooks: TempDir::new().unwrap(),
        }
    }

    /// Write a file on card `card` at `relative` (e.g. `DCIM/100CANON/IMG_0001.JPG`)
    pub fn card_file(&self, card: &str, relative: &str, content: &[u8], modified: SystemTime) -> PathBuf {
        let path = self.mount.path().join(card).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
        path
    }

    /// Executable (never actually executed) hook script
    #[cfg(unix)]
    pub fn add_hook(&self, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.hooks.path().join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    pub fn archive_path(&self, relative: &str) -> PathBuf {
        self.archive.path().join(relative)
    }

    pub fn config(&self) -> ImporterConfig {
        ImporterConfig {
            mount_points: vec![self.mount.path().to_path_buf()],
            archive_root: self.archive.path().to_path_buf(),
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
            hooks_dir: Some(self.hooks.path().to_path_buf()),
            metadata_tool: PathBuf::from(METADATA_TOOL),
            tool_timeout: Duration::from_secs(5),
            verify_existing: true,
            notifications: NotificationSettings {
                enabled: true,
                server: "http://localhost:9".to_string(),
                topic: Some("mediasync-test".to_string()),
                notify_each_file: true,
            },
            log_level: "debug".to_string(),
        }
    }

    pub fn scan_loop(&self, runner: Arc<FakeRunner>, notifier: Arc<RecordingNotifier>) -> ScanLoop {
        ScanLoop::from_config(&self.config(), runner, notifier)
    }
}

/// 2023-05-02T04:00:00Z
pub fn some_mtime() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_683_000_000)
}
