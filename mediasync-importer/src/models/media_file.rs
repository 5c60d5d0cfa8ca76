//! Media files discovered on a card

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Statistics category of a supported file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Photo,
    Video,
    /// Camera raw stills, tracked apart from regular photos
    Raw,
}

impl MediaCategory {
    /// Category for a lower-cased extension (no leading dot), if supported
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" | "png" | "gif" | "heic" | "heif" => Some(Self::Photo),
            "cr2" | "cr3" | "arw" | "nef" | "dng" | "raf" | "orf" | "rw2" => Some(Self::Raw),
            "mp4" | "mov" | "avi" | "mts" | "m2ts" | "m4v" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Lower-cased extension of a path, without the dot
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// A candidate file found during one scan cycle
///
/// Lives only for the cycle that discovered it.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Absolute source path
    pub path: PathBuf,
    /// Lower-cased extension
    pub extension: String,
    pub size: u64,
    pub modified: SystemTime,
    pub category: MediaCategory,
    /// Name of the card (mount directory) the file was found on
    pub card: String,
}

impl MediaFile {
    /// Build from a path on disk
    ///
    /// Returns `Ok(None)` for unsupported extensions.
    pub fn from_path(path: &Path, card: &str) -> std::io::Result<Option<Self>> {
        let Some(extension) = lowercase_extension(path) else {
            return Ok(None);
        };
        let Some(category) = MediaCategory::from_extension(&extension) else {
            return Ok(None);
        };

        let metadata = std::fs::metadata(path)?;
        Ok(Some(Self {
            path: path.to_path_buf(),
            extension,
            size: metadata.len(),
            modified: metadata.modified()?,
            category,
            card: card.to_string(),
        }))
    }

    /// Original filename, as it will appear in the archive
    pub fn file_name(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}
