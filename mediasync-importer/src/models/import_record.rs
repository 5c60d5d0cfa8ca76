//! Outcome of importing one file

use chrono::{NaiveDate, NaiveTime};
use std::fmt;
use std::path::PathBuf;

/// Where a resolved date came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Capture date read by the metadata tool
    Metadata,
    /// Filesystem modification time fallback
    FileModified,
}

/// Creation date used to place a file in the archive
///
/// Only `date` affects the destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub source: DateSource,
}

impl ResolvedDate {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>, source: DateSource) -> Self {
        Self { date, time, source }
    }
}

/// Why a file was not copied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Same content already imported during this process lifetime
    DuplicateFingerprint,
    /// Destination path already present in the archive
    ///
    /// `content_matches` is false for a name collision with different
    /// bytes, or when existing destinations are trusted without hashing.
    DestinationExists { content_matches: bool },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateFingerprint => write!(f, "duplicate-fingerprint"),
            Self::DestinationExists { .. } => write!(f, "destination-exists"),
        }
    }
}

/// Failure category of an import attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Source could not be read for hashing
    Read,
    /// No usable date, not even the filesystem time
    Date,
    /// Directory creation, copy or rename failed
    Copy,
    /// Copied bytes empty or not equal to the source
    Verification,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Read => "read",
            Self::Date => "date",
            Self::Copy => "copy",
            Self::Verification => "verification",
        };
        write!(f, "{}", label)
    }
}

/// Result of one (cycle, file) import attempt
///
/// Never mutated after creation; folded into batch statistics and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportRecord {
    Imported {
        destination: PathBuf,
        bytes: u64,
        date: ResolvedDate,
    },
    Skipped(SkipReason),
    Failed {
        reason: FailureReason,
        message: String,
    },
}

impl ImportRecord {
    pub fn failed(reason: FailureReason, message: impl Into<String>) -> Self {
        Self::Failed {
            reason,
            message: message.into(),
        }
    }

    pub fn is_imported(&self) -> bool {
        matches!(self, Self::Imported { .. })
    }

    /// Outcomes after which the fingerprint counts as present in the archive
    ///
    /// Any existing destination counts, including a name collision with
    /// different bytes: same name on the same date is "already imported".
    /// Another copy of that content elsewhere on the card is therefore a
    /// duplicate, and the collision is only visible in the log.
    pub fn marks_processed(&self) -> bool {
        matches!(
            self,
            Self::Imported { .. } | Self::Skipped(SkipReason::DestinationExists { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_processed() {
        let date = ResolvedDate::new(
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            None,
            DateSource::Metadata,
        );
        let imported = ImportRecord::Imported {
            destination: PathBuf::from("/archive/2024/03-07/a.jpg"),
            bytes: 1,
            date,
        };
        assert!(imported.marks_processed());
        assert!(ImportRecord::Skipped(SkipReason::DestinationExists { content_matches: true })
            .marks_processed());
        assert!(ImportRecord::Skipped(SkipReason::DestinationExists { content_matches: false })
            .marks_processed());
        assert!(!ImportRecord::Skipped(SkipReason::DuplicateFingerprint).marks_processed());
        assert!(!ImportRecord::failed(FailureReason::Verification, "mismatch").marks_processed());
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(SkipReason::DuplicateFingerprint.to_string(), "duplicate-fingerprint");
        assert_eq!(
            SkipReason::DestinationExists { content_matches: false }.to_string(),
            "destination-exists"
        );
        assert_eq!(FailureReason::Verification.to_string(), "verification");
    }
}
