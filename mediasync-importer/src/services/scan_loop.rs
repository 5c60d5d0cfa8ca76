//! Poll-driven scan loop
//!
//! Two states: `Idle` (sleeping between cycles) and `Scanning`. Each cycle
//! enumerates every mount point, runs the import pipeline on each new file,
//! folds the outcomes into [`BatchStats`] and sends one batch summary when
//! anything happened. A file that keeps failing is reported once, not on
//! every poll.
//!
//! Errors never escape a cycle: a bad mount point is logged and skipped
//! (and the next sleep uses the longer back-off), a bad file becomes a
//! `Failed` record.

use crate::models::{BatchStats, FailureReason, ImportRecord, MediaFile, SkipReason};
use crate::services::content_hasher::ContentHasher;
use crate::services::file_scanner::{FileScanner, ScanError};
use crate::services::hook_runner::HookRunner;
use crate::services::import_executor::{ExecutorOptions, ImportExecutor};
use crate::services::metadata_resolver::MetadataResolver;
use crate::services::notifier::{notify_best_effort, Notification, Notifier};
use crate::services::path_planner::PathPlanner;
use crate::services::process_runner::ProcessRunner;
use crate::services::processed_set::ProcessedSet;
use mediasync_common::ImporterConfig;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Scanning,
}

/// What one cycle did
#[derive(Debug, Default)]
pub struct CycleReport {
    pub stats: BatchStats,
    /// Import records produced (path-cache hits produce none)
    pub records: usize,
    /// Mount points that could not be enumerated
    pub enumeration_errors: usize,
    /// Failures not reported in an earlier cycle
    pub new_failures: usize,
    /// Shutdown was requested before every file was visited
    pub cancelled: bool,
    pub summary_sent: bool,
    pub duration: Duration,
}

/// Sequential scan-and-import worker
pub struct ScanLoop {
    mount_points: Vec<PathBuf>,
    poll_interval: Duration,
    error_backoff: Duration,
    scanner: FileScanner,
    hasher: ContentHasher,
    resolver: MetadataResolver,
    planner: PathPlanner,
    executor: ImportExecutor,
    notifier: Arc<dyn Notifier>,
    /// Card roots seen last cycle, for one-shot "card detected" messages
    known_cards: HashSet<PathBuf>,
    state: LoopState,
    trigger: Arc<Notify>,
}

impl ScanLoop {
    /// Assemble the pipeline from configuration and capabilities
    pub fn from_config(
        config: &ImporterConfig,
        runner: Arc<dyn ProcessRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let resolver = MetadataResolver::new(
            runner.clone(),
            config.metadata_tool.clone(),
            config.tool_timeout,
        );
        let hooks = HookRunner::new(runner, config.hooks_dir.clone(), config.tool_timeout);
        let executor = ImportExecutor::new(
            hooks,
            notifier.clone(),
            ExecutorOptions {
                verify_existing: config.verify_existing,
                notify_each_file: config.notifications.notify_each_file,
            },
        );

        Self {
            mount_points: config.mount_points.clone(),
            poll_interval: config.poll_interval,
            error_backoff: config.error_backoff,
            scanner: FileScanner::new(),
            hasher: ContentHasher::new(),
            resolver,
            planner: PathPlanner::new(config.archive_root.clone()),
            executor,
            notifier,
            known_cards: HashSet::new(),
            state: LoopState::Idle,
            trigger: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Handle that wakes the loop early from its sleep
    pub fn trigger_handle(&self) -> Arc<Notify> {
        self.trigger.clone()
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "Scan loop state change");
            self.state = next;
        }
    }

    /// Run cycles until `shutdown` is cancelled
    ///
    /// A cancelled cycle stops before the next card or file; the file in
    /// flight is finished first.
    pub async fn run(&mut self, processed: &mut ProcessedSet, shutdown: CancellationToken) {
        tracing::info!(
            mount_points = ?self.mount_points,
            archive_root = %self.planner.archive_root().display(),
            poll_interval = ?self.poll_interval,
            "Scan loop started"
        );

        while !shutdown.is_cancelled() {
            let report = self.run_cycle(processed, &shutdown).await;
            if report.cancelled {
                break;
            }

            let sleep_for = if report.enumeration_errors > 0 {
                tracing::warn!(
                    errors = report.enumeration_errors,
                    backoff = ?self.error_backoff,
                    "Cycle had enumeration errors, backing off"
                );
                self.error_backoff
            } else {
                self.poll_interval
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.trigger.notified() => {
                    tracing::info!("Scan triggered externally");
                }
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }

        self.transition(LoopState::Idle);
        tracing::info!(processed = processed.len(), "Scan loop stopped");
    }

    /// One full pass over all mount points
    pub async fn run_cycle(
        &mut self,
        processed: &mut ProcessedSet,
        shutdown: &CancellationToken,
    ) -> CycleReport {
        self.transition(LoopState::Scanning);
        let started = Instant::now();
        let mut report = CycleReport::default();
        let mut present_cards = HashSet::new();
        // Mount points whose cards could not be listed this cycle
        let mut unavailable = Vec::new();

        let mount_points = self.mount_points.clone();
        'mounts: for mount_point in &mount_points {
            let cards = match self.scanner.find_cards(mount_point) {
                Ok(cards) => cards,
                Err(ScanError::PathNotFound(_)) => {
                    tracing::debug!(mount_point = %mount_point.display(), "Mount point absent");
                    unavailable.push(mount_point.clone());
                    continue;
                }
                Err(e) => {
                    tracing::error!(mount_point = %mount_point.display(), error = %e, "Enumeration failed");
                    report.enumeration_errors += 1;
                    unavailable.push(mount_point.clone());
                    continue;
                }
            };

            for card in cards {
                if shutdown.is_cancelled() {
                    report.cancelled = true;
                    break 'mounts;
                }

                present_cards.insert(card.root.clone());
                if !self.known_cards.contains(&card.root) {
                    tracing::info!(card = %card.name, root = %card.root.display(), "SD card detected");
                    notify_best_effort(self.notifier.as_ref(), &Notification::card_detected(&card.name))
                        .await;
                }

                let scan = self.scanner.scan_card(&card);
                for file in &scan.files {
                    if shutdown.is_cancelled() {
                        report.cancelled = true;
                        break 'mounts;
                    }

                    let Some(record) = self.process_file(file, processed).await else {
                        continue;
                    };
                    report.records += 1;
                    report.stats.fold(file, &record);

                    if let ImportRecord::Failed { reason, .. } = record {
                        if processed.note_failure(file) {
                            report.new_failures += 1;
                            if matches!(reason, FailureReason::Copy | FailureReason::Verification) {
                                let name = file.file_name().to_string_lossy();
                                notify_best_effort(
                                    self.notifier.as_ref(),
                                    &Notification::import_failed(&name, reason),
                                )
                                .await;
                            }
                        }
                    }
                }
            }
        }

        if report.cancelled {
            tracing::info!(records = report.records, "Cycle interrupted by shutdown");
            report.stats.interrupted = true;
            self.known_cards.extend(present_cards);
        } else {
            // A card behind an unavailable mount point is not announced again
            // when the mount returns
            self.known_cards
                .retain(|root| unavailable.iter().any(|mount| root.starts_with(mount)));
            self.known_cards.extend(present_cards);
        }

        if report.stats.has_activity() || report.new_failures > 0 {
            let message = report.stats.summary_message(self.planner.archive_root());
            tracing::info!(
                imported = report.stats.total.count,
                bytes = report.stats.total.bytes,
                duplicates = report.stats.duplicates,
                failed = report.stats.failed,
                "Batch complete"
            );
            notify_best_effort(self.notifier.as_ref(), &Notification::batch_summary(message)).await;
            report.summary_sent = true;
        } else if report.stats.failed > 0 {
            tracing::debug!(failed = report.stats.failed, "Only previously reported failures");
        }

        report.duration = started.elapsed();
        self.transition(LoopState::Idle);
        report
    }

    /// Pipeline for one file; `None` when already handled in an earlier cycle
    pub async fn process_file(&self, file: &MediaFile, processed: &mut ProcessedSet) -> Option<ImportRecord> {
        if processed.lookup_path(file).is_some() {
            tracing::trace!(path = %file.path.display(), "Already handled");
            return None;
        }

        let fingerprint = match self.hasher.fingerprint(&file.path).await {
            Ok(fp) => fp,
            Err(e) => {
                // Not cached: retried next cycle
                tracing::warn!(path = %file.path.display(), error = %e, "Cannot read file, will retry");
                return Some(ImportRecord::failed(FailureReason::Read, e.to_string()));
            }
        };

        if processed.seen(&fingerprint) {
            tracing::info!(
                path = %file.path.display(),
                fingerprint = %fingerprint.short(),
                "Skipped duplicate content"
            );
            processed.remember_path(file, fingerprint);
            return Some(ImportRecord::Skipped(SkipReason::DuplicateFingerprint));
        }

        let date = match self.resolver.resolve(file).await {
            Ok(date) => date,
            Err(e) => {
                tracing::error!(path = %file.path.display(), error = %e, "No usable date");
                return Some(ImportRecord::failed(FailureReason::Date, e.to_string()));
            }
        };

        let destination = self.planner.plan(date.date, file.file_name());
        let record = self
            .executor
            .execute(file, &fingerprint, &destination, date)
            .await;

        if record.marks_processed() {
            processed.mark(fingerprint);
            processed.remember_path(file, fingerprint);
        }

        Some(record)
    }
}
