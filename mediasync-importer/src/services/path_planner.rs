//! Archive destination planning
//!
//! `{archive_root}/{YYYY}/{MM}-{DD}/{filename}`. Pure; no I/O. Two different
//! files sharing date and name map to the same destination on purpose: the
//! executor reports the second as already present instead of renaming.

use chrono::{Datelike, NaiveDate};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Maps a resolved date and original filename to an archive path
#[derive(Debug, Clone)]
pub struct PathPlanner {
    archive_root: PathBuf,
}

impl PathPlanner {
    pub fn new(archive_root: PathBuf) -> Self {
        Self { archive_root }
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn plan(&self, date: NaiveDate, filename: &OsStr) -> PathBuf {
        plan(&self.archive_root, date, filename)
    }
}

/// Destination for `filename` dated `date` under `archive_root`
pub fn plan(archive_root: &Path, date: NaiveDate, filename: &OsStr) -> PathBuf {
    archive_root
        .join(format!("{:04}", date.year()))
        .join(format!("{:02}-{:02}", date.month(), date.day()))
        .join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_layout() {
        let root = Path::new("/home/pi/Pictures");
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            plan(root, date, OsStr::new("IMG_01.JPG")),
            PathBuf::from("/home/pi/Pictures/2024/03-07/IMG_01.JPG")
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let planner = PathPlanner::new(PathBuf::from("/archive"));
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let first = planner.plan(date, OsStr::new("C0001.MP4"));
        let _other = planner.plan(NaiveDate::from_ymd_opt(1999, 1, 1).unwrap(), OsStr::new("x.jpg"));
        let second = planner.plan(date, OsStr::new("C0001.MP4"));
        assert_eq!(first, second);
        assert_eq!(first, PathBuf::from("/archive/2023/12-31/C0001.MP4"));
    }

    #[test]
    fn test_plan_pads_early_years() {
        let date = NaiveDate::from_ymd_opt(987, 1, 2).unwrap();
        assert_eq!(
            plan(Path::new("/a"), date, OsStr::new("f.jpg")),
            PathBuf::from("/a/0987/01-02/f.jpg")
        );
    }

    #[test]
    fn test_plan_keeps_original_case() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            plan(Path::new("/a"), date, OsStr::new("DSC00042.ARW"))
                .file_name()
                .unwrap(),
            "DSC00042.ARW"
        );
    }
}
