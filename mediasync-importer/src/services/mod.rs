//! Import pipeline services
//!
//! Leaves first: hashing, date resolution and path planning feed the
//! executor; the scan loop drives them all once per poll cycle.

pub mod content_hasher;
pub mod file_scanner;
pub mod hook_runner;
pub mod import_executor;
pub mod metadata_resolver;
pub mod notifier;
pub mod path_planner;
pub mod process_runner;
pub mod processed_set;
pub mod scan_loop;

pub use content_hasher::{ContentHasher, HashError};
pub use file_scanner::{Card, CardScan, FileScanner, ScanError};
pub use hook_runner::{HookReport, HookRunner};
pub use import_executor::{ExecutorOptions, ImportError, ImportExecutor, StagedCopy};
pub use metadata_resolver::{DateError, MetadataResolver, ToolFailure};
pub use notifier::{
    build_notifier, DisabledNotifier, Notification, NotificationKind, Notifier, NotifyError,
    NtfyNotifier,
};
pub use path_planner::PathPlanner;
pub use process_runner::{ProcessOutput, ProcessRunner, TokioProcessRunner, ToolError};
pub use processed_set::ProcessedSet;
pub use scan_loop::{CycleReport, LoopState, ScanLoop};
