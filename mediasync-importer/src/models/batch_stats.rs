//! Per-cycle import statistics
//!
//! Accumulated by folding every [`ImportRecord`] of a cycle, then rendered
//! into the end-of-cycle batch summary.

use crate::models::{ImportRecord, MediaCategory, MediaFile, SkipReason};
use chrono::NaiveDate;
use mediasync_common::format_human_size;
use std::collections::BTreeSet;
use std::path::Path;

/// Failure messages kept for the summary; the count is always exact
const MAX_FAILURE_MESSAGES: usize = 5;

/// File count and byte total for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryTotals {
    pub count: usize,
    pub bytes: u64,
}

impl CategoryTotals {
    fn add(&mut self, bytes: u64) {
        self.count += 1;
        self.bytes += bytes;
    }

    /// "3 (1.2 MB)"
    pub fn display_string(&self) -> String {
        format!("{} ({})", self.count, format_human_size(self.bytes))
    }
}

/// Statistics for one scan cycle
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub photo: CategoryTotals,
    pub video: CategoryTotals,
    pub raw: CategoryTotals,
    /// Sum over all categories
    pub total: CategoryTotals,
    /// Resolved dates of imported files
    pub dates: Vec<NaiveDate>,
    /// Files skipped because their content or destination was already present
    pub duplicates: usize,
    pub failed: usize,
    pub failure_messages: Vec<String>,
    /// Cards that contributed at least one record
    pub cards: BTreeSet<String>,
    /// Shutdown stopped the cycle before every file was visited
    pub interrupted: bool,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one import outcome into the totals
    pub fn fold(&mut self, file: &MediaFile, record: &ImportRecord) {
        self.cards.insert(file.card.clone());

        match record {
            ImportRecord::Imported { bytes, date, .. } => {
                let totals = match file.category {
                    MediaCategory::Photo => &mut self.photo,
                    MediaCategory::Video => &mut self.video,
                    MediaCategory::Raw => &mut self.raw,
                };
                totals.add(*bytes);
                self.total.add(*bytes);
                self.dates.push(date.date);
            }
            ImportRecord::Skipped(SkipReason::DuplicateFingerprint)
            | ImportRecord::Skipped(SkipReason::DestinationExists { .. }) => {
                self.duplicates += 1;
            }
            ImportRecord::Failed { reason, message } => {
                self.failed += 1;
                if self.failure_messages.len() < MAX_FAILURE_MESSAGES {
                    self.failure_messages.push(format!(
                        "{} ({}): {}",
                        file.file_name().to_string_lossy(),
                        reason,
                        message
                    ));
                }
            }
        }
    }

    /// True when the cycle imported something or skipped duplicates
    pub fn has_activity(&self) -> bool {
        self.total.count > 0 || self.duplicates > 0
    }

    /// Earliest and latest resolved date of imported files
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.dates.iter().min()?;
        let max = self.dates.iter().max()?;
        Some((*min, *max))
    }

    pub fn status(&self) -> &'static str {
        if self.failed > 0 || self.interrupted {
            "PARTIAL"
        } else {
            "COMPLETE"
        }
    }

    fn date_range_string(&self) -> String {
        match self.date_range() {
            Some((min, max)) if min == max => min.format("%Y-%m-%d").to_string(),
            Some((min, max)) => format!("{} to {}", min.format("%Y-%m-%d"), max.format("%Y-%m-%d")),
            None => "n/a".to_string(),
        }
    }

    /// Plain-text body of the batch summary notification
    pub fn summary_message(&self, archive_root: &Path) -> String {
        let cards = if self.cards.is_empty() {
            "unknown".to_string()
        } else {
            self.cards.iter().cloned().collect::<Vec<_>>().join(", ")
        };

        let mut message = format!(
            "Batch {}:\n\
             - SD Card: {}\n\
             - Files: {}\n\
             - Photos: {}\n\
             - Videos: {}\n\
             - RAW: {}\n\
             - Duplicates: {}\n\
             - Dates: {}\n\
             - Destination: {}",
            self.status(),
            cards,
            self.total.display_string(),
            self.photo.display_string(),
            self.video.display_string(),
            self.raw.display_string(),
            self.duplicates,
            self.date_range_string(),
            archive_root.display(),
        );

        if self.failed > 0 {
            message.push_str(&format!("\n- Error: {} failed", self.failed));
            if let Some(first) = self.failure_messages.first() {
                message.push_str(&format!(": {}", first));
            }
        }
        if self.interrupted {
            message.push_str("\n- Interrupted: remaining files are imported on the next run");
        }

        message
    }
}
