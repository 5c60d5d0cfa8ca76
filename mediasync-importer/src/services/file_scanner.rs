//! Card and media file discovery
//!
//! A *card* is a mount point itself or any directory directly beneath it.
//! Media is only looked for under the layouts cameras write:
//! - `DCIM/` for stills and most video
//! - `PRIVATE/M4ROOT/CLIP/` for Sony XAVC clips
//!
//! Files are filtered by extension; dot-files (including our own `.partial`
//! temporaries and macOS `._` forks) and OS clutter are ignored. Symbolic
//! links are neither followed nor imported.

use crate::models::MediaFile;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Photo subtree
pub const DCIM_DIR: &str = "DCIM";
/// Raw-video subtree, relative to the card root
pub const CLIP_DIR: [&str; 3] = ["PRIVATE", "M4ROOT", "CLIP"];

/// Scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Directory could not be listed
    #[error("Cannot read {0}: {1}")]
    ReadDir(PathBuf, String),
}

/// A card found under a mount point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Display name (directory name, or the mount point itself)
    pub name: String,
    pub root: PathBuf,
    /// Media subtrees present on this card
    pub media_roots: Vec<PathBuf>,
}

/// Everything found on one card during a cycle
#[derive(Debug, Default)]
pub struct CardScan {
    pub files: Vec<MediaFile>,
    /// Per-entry problems; the walk continues past them
    pub errors: Vec<String>,
}

/// Discovers cards and their supported media files
pub struct FileScanner {
    ignore_patterns: Vec<String>,
}

impl FileScanner {
    /// Create new scanner with default ignore patterns
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "System Volume Information".to_string(),
                ".Trashes".to_string(),
                ".Spotlight-V100".to_string(),
            ],
        }
    }

    /// Cards with media under `mount_point`, sorted by name
    ///
    /// Fails only if the mount point itself cannot be listed.
    pub fn find_cards(&self, mount_point: &Path) -> Result<Vec<Card>, ScanError> {
        if !mount_point.exists() {
            return Err(ScanError::PathNotFound(mount_point.to_path_buf()));
        }
        if !mount_point.is_dir() {
            return Err(ScanError::NotADirectory(mount_point.to_path_buf()));
        }

        let mut cards = Vec::new();

        // A card mounted directly at the mount point
        if let Some(card) = self.card_at(mount_point) {
            cards.push(card);
        }

        let entries = std::fs::read_dir(mount_point)
            .map_err(|e| ScanError::ReadDir(mount_point.to_path_buf(), e.to_string()))?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(mount_point = %mount_point.display(), error = %e, "Error reading mount entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() || path.file_name().and_then(|n| n.to_str()) == Some(DCIM_DIR) {
                continue;
            }
            if let Some(card) = self.card_at(&path) {
                cards.push(card);
            }
        }

        cards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cards)
    }

    fn card_at(&self, root: &Path) -> Option<Card> {
        let mut media_roots = Vec::new();

        let dcim = root.join(DCIM_DIR);
        if dcim.is_dir() {
            media_roots.push(dcim);
        }

        let clip: PathBuf = CLIP_DIR.iter().fold(root.to_path_buf(), |p, seg| p.join(seg));
        if clip.is_dir() {
            media_roots.push(clip);
        }

        if media_roots.is_empty() {
            return None;
        }

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        Some(Card {
            name,
            root: root.to_path_buf(),
            media_roots,
        })
    }

    /// Walk a card's media subtrees for supported files
    ///
    /// Sorted by path so processing order is stable between cycles.
    pub fn scan_card(&self, card: &Card) -> CardScan {
        let mut scan = CardScan::default();

        for media_root in &card.media_roots {
            let walker = WalkDir::new(media_root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| self.should_process_entry(e));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(card = %card.name, error = %e, "Error accessing entry");
                        scan.errors.push(e.to_string());
                        continue;
                    }
                };

                if !entry.file_type().is_file() {
                    continue;
                }

                match MediaFile::from_path(entry.path(), &card.name) {
                    Ok(Some(file)) => scan.files.push(file),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(path = %entry.path().display(), error = %e, "Cannot stat file");
                        scan.errors.push(format!("{}: {}", entry.path().display(), e));
                    }
                }
            }
        }

        scan.files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(
            card = %card.name,
            files = scan.files.len(),
            errors = scan.errors.len(),
            "Card scan complete"
        );
        scan
    }

    /// Check if entry should be processed
    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        // Never filter the walk root itself
        if entry.depth() == 0 {
            return true;
        }

        let file_name = entry.file_name().to_string_lossy();
        if file_name.starts_with('.') {
            return false;
        }
        !self.ignore_patterns.iter().any(|p| file_name == p.as_str())
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaCategory;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_find_cards_nonexistent_mount() {
        let scanner = FileScanner::new();
        match scanner.find_cards(Path::new("/nonexistent/media/pi")) {
            Err(ScanError::PathNotFound(_)) => {}
            other => panic!("Expected PathNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_find_cards_requires_media_layout() {
        let mount = TempDir::new().unwrap();
        touch(&mount.path().join("EOS_DIGITAL/DCIM/100CANON/IMG_0001.JPG"), b"a");
        touch(&mount.path().join("SONY/PRIVATE/M4ROOT/CLIP/C0001.MP4"), b"b");
        touch(&mount.path().join("USB_STICK/docs/report.pdf"), b"c");

        let cards = FileScanner::new().find_cards(mount.path()).unwrap();
        let names: Vec<_> = cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["EOS_DIGITAL", "SONY"]);
        assert_eq!(cards[1].media_roots.len(), 1);
        assert!(cards[1].media_roots[0].ends_with("PRIVATE/M4ROOT/CLIP"));
    }

    #[test]
    fn test_mount_point_itself_can_be_a_card() {
        let mount = TempDir::new().unwrap();
        touch(&mount.path().join("DCIM/100CANON/IMG_0001.JPG"), b"a");

        let cards = FileScanner::new().find_cards(mount.path()).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].root, mount.path());
    }

    #[test]
    fn test_scan_card_filters_extensions_and_hidden() {
        let mount = TempDir::new().unwrap();
        let card = mount.path().join("CARD");
        touch(&card.join("DCIM/100CANON/IMG_0001.JPG"), b"a");
        touch(&card.join("DCIM/100CANON/IMG_0001.CR2"), b"raw");
        touch(&card.join("DCIM/100CANON/._IMG_0001.JPG"), b"fork");
        touch(&card.join("DCIM/100CANON/.IMG_0002.JPG.abc.partial"), b"tmp");
        touch(&card.join("DCIM/100CANON/Thumbs.db"), b"x");
        touch(&card.join("DCIM/100CANON/IMG_0001.XMP"), b"sidecar");
        touch(&card.join("DCIM/.hidden/IMG_0003.JPG"), b"h");

        let scanner = FileScanner::new();
        let cards = scanner.find_cards(mount.path()).unwrap();
        let scan = scanner.scan_card(&cards[0]);

        let names: Vec<_> = scan
            .files
            .iter()
            .map(|f| f.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["IMG_0001.CR2", "IMG_0001.JPG"]);
        assert_eq!(scan.files[0].category, MediaCategory::Raw);
        assert_eq!(scan.files[1].card, "CARD");
    }

    #[test]
    fn test_empty_mount_has_no_cards() {
        let mount = TempDir::new().unwrap();
        assert!(FileScanner::new().find_cards(mount.path()).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed_or_imported() {
        let mount = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let card = mount.path().join("CARD");
        touch(&card.join("DCIM/100CANON/IMG_0001.JPG"), b"a");
        touch(&elsewhere.path().join("100LINK/IMG_0100.JPG"), b"b");
        std::os::unix::fs::symlink(
            card.join("DCIM/100CANON/IMG_0001.JPG"),
            card.join("DCIM/100CANON/IMG_0002.JPG"),
        )
        .unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("100LINK"), card.join("DCIM/100LINK"))
            .unwrap();
        // Loop back to the card root
        std::os::unix::fs::symlink(&card, card.join("DCIM/100LOOP")).unwrap();

        let scanner = FileScanner::new();
        let cards = scanner.find_cards(mount.path()).unwrap();
        let scan = scanner.scan_card(&cards[0]);

        let names: Vec<_> = scan
            .files
            .iter()
            .map(|f| f.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["IMG_0001.JPG"]);
        assert!(scan.errors.is_empty());
    }
}
