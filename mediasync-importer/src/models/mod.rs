//! Data models for the media import pipeline
//!
//! All of these live for at most one scan cycle; nothing here is persisted.

pub mod batch_stats;
pub mod fingerprint;
pub mod import_record;
pub mod media_file;

pub use batch_stats::{BatchStats, CategoryTotals};
pub use fingerprint::Fingerprint;
pub use import_record::{DateSource, FailureReason, ImportRecord, ResolvedDate, SkipReason};
pub use media_file::{lowercase_extension, MediaCategory, MediaFile};
