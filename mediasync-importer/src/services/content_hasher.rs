//! Content fingerprinting
//!
//! Streams a file through SHA-256 in fixed-size chunks on a blocking
//! thread. Used both for deduplication and for verifying copies.

use crate::models::Fingerprint;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Read buffer size (1 MiB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// Hashing errors
#[derive(Debug, Error)]
pub enum HashError {
    /// File could not be opened or read
    #[error("Failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    /// Blocking hash task panicked or was cancelled
    #[error("Hash task failed: {0}")]
    Task(String),
}

/// SHA-256 content hasher
#[derive(Debug, Default, Clone)]
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint a file's full content
    ///
    /// Zero-byte files hash successfully; rejecting them is the integrity
    /// check's job.
    pub async fn fingerprint(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let path_buf = path.to_path_buf();
        tracing::debug!(path = %path_buf.display(), "Calculating SHA-256 hash");

        let fingerprint = tokio::task::spawn_blocking(move || fingerprint_blocking(&path_buf))
            .await
            .map_err(|e| HashError::Task(e.to_string()))??;

        tracing::debug!(
            path = %path.display(),
            fingerprint = %fingerprint.short(),
            "Calculated hash"
        );

        Ok(fingerprint)
    }
}

/// Synchronous hashing, for callers already on a blocking thread
pub fn fingerprint_blocking(path: &Path) -> Result<Fingerprint, HashError> {
    let mut file = File::open(path).map_err(|e| HashError::Read(path.to_path_buf(), e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HashError::Read(path.to_path_buf(), e)),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Fingerprint::from_bytes(hasher.finalize().into()))
}
