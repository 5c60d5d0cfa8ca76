//! In-memory record of imported content
//!
//! Lives as long as the process. A restart starts empty; the executor's
//! destination-exists check is the durable backstop.
//!
//! A fingerprint is marked when its file was imported or its destination
//! already existed, even with different bytes (a name collision). See
//! [`ImportRecord::marks_processed`](crate::models::ImportRecord::marks_processed).

use crate::models::{Fingerprint, MediaFile};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::SystemTime;

/// Identity of a file on the source as seen by the scanner
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PathSignature {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

impl PathSignature {
    fn of(file: &MediaFile) -> Self {
        Self {
            path: file.path.clone(),
            size: file.size,
            modified: file.modified,
        }
    }
}

/// Fingerprints already imported (or found in the archive) by this process
///
/// Also caches path signature → fingerprint so a file left on the card is
/// not re-hashed on every poll. A changed size or mtime invalidates the
/// cached entry.
#[derive(Debug, Default)]
pub struct ProcessedSet {
    fingerprints: HashSet<Fingerprint>,
    paths: HashMap<PathSignature, Fingerprint>,
    /// Files whose last attempt failed and was already reported
    failures: HashSet<PathSignature>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    pub fn mark(&mut self, fingerprint: Fingerprint) {
        self.fingerprints.insert(fingerprint);
    }

    /// Fingerprint recorded for this exact file in an earlier cycle
    pub fn lookup_path(&self, file: &MediaFile) -> Option<Fingerprint> {
        self.paths.get(&PathSignature::of(file)).copied()
    }

    /// Remember that this file has been fully handled
    pub fn remember_path(&mut self, file: &MediaFile, fingerprint: Fingerprint) {
        let signature = PathSignature::of(file);
        self.failures.remove(&signature);
        self.paths.insert(signature, fingerprint);
    }

    /// Record a failed attempt; true the first time this exact file fails
    pub fn note_failure(&mut self, file: &MediaFile) -> bool {
        self.failures.insert(PathSignature::of(file))
    }

    /// Number of distinct fingerprints marked
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}
