//! Creation date resolution
//!
//! Fallback chain, in order:
//! 1. Capture date from the metadata tool (exiftool)
//! 2. Filesystem modification time, truncated to the local calendar day
//!
//! Only a failure to read the filesystem time is an error.

use crate::models::{DateSource, MediaFile, ResolvedDate};
use crate::services::process_runner::{ProcessRunner, ToolError};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Date/time layout requested from the metadata tool
const TOOL_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// No usable date at all
#[derive(Debug, Error)]
#[error("Cannot read modification time of {path}: {source}")]
pub struct DateError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Why the metadata tool step did not produce a date
#[derive(Debug, Error)]
pub enum ToolFailure {
    /// Tool missing or could not be started
    #[error("{0}")]
    Spawn(ToolError),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("{}", exit_description(.0))]
    NonZeroExit(Option<i32>),

    #[error("no capture date in output")]
    EmptyOutput,

    #[error("unparseable date '{0}'")]
    Unparseable(String),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl From<ToolError> for ToolFailure {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Timeout(_, after) => Self::Timeout(after),
            other => Self::Spawn(other),
        }
    }
}

/// Resolves the authoritative creation date of a media file
pub struct MetadataResolver {
    runner: Arc<dyn ProcessRunner>,
    tool: PathBuf,
    timeout: Duration,
}

impl MetadataResolver {
    pub fn new(runner: Arc<dyn ProcessRunner>, tool: PathBuf, timeout: Duration) -> Self {
        Self {
            runner,
            tool,
            timeout,
        }
    }

    /// Resolve the date used for archive placement
    pub async fn resolve(&self, file: &MediaFile) -> Result<ResolvedDate, DateError> {
        match self.capture_date(&file.path).await {
            Ok(date) => return Ok(date),
            Err(failure) => {
                tracing::debug!(
                    path = %file.path.display(),
                    cause = %failure,
                    "Metadata date unavailable, falling back to modification time"
                );
            }
        }

        // Re-read rather than trusting the scan-time value so a file replaced
        // since discovery is dated correctly
        let modified = std::fs::metadata(&file.path)
            .and_then(|m| m.modified())
            .map_err(|source| DateError {
                path: file.path.clone(),
                source,
            })?;

        Ok(date_from_modified(modified))
    }

    /// Step 1: ask the metadata tool for the capture date
    pub async fn capture_date(&self, path: &Path) -> Result<ResolvedDate, ToolFailure> {
        let args: Vec<OsString> = vec![
            "-CreateDate".into(),
            "-d".into(),
            TOOL_DATE_FORMAT.into(),
            "-s3".into(),
            path.as_os_str().to_os_string(),
        ];

        let output = self
            .runner
            .run(&self.tool, &args, self.timeout)
            .await?;

        if !output.success() {
            return Err(ToolFailure::NonZeroExit(output.exit_code));
        }

        let raw = output.stdout.lines().map(str::trim).find(|l| !l.is_empty());
        let Some(raw) = raw else {
            return Err(ToolFailure::EmptyOutput);
        };

        parse_tool_date(raw).ok_or_else(|| ToolFailure::Unparseable(raw.to_string()))
    }
}

/// Parse `YYYY:MM:DD[ HH:MM:SS[...]]` (also `-` separated)
///
/// Trailing sub-seconds or timezone suffixes are ignored. All-zero dates,
/// which cameras write when the clock was never set, are rejected.
pub fn parse_tool_date(raw: &str) -> Option<ResolvedDate> {
    let raw = raw.trim();
    let date_part = raw.get(..10)?;
    let date_part = date_part.replace('-', ":");
    let date = NaiveDate::parse_from_str(&date_part, "%Y:%m:%d").ok()?;

    let time = raw
        .get(11..19)
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M:%S").ok());

    Some(ResolvedDate::new(date, time, DateSource::Metadata))
}

/// Step 2: modification time in local time, date-only
pub fn date_from_modified(modified: SystemTime) -> ResolvedDate {
    let local: DateTime<Local> = modified.into();
    let naive: NaiveDateTime = local.naive_local();
    ResolvedDate::new(naive.date(), None, DateSource::FileModified)
}
