//! Human-readable byte size formatting
//!
//! Used by batch summaries and log lines so sizes read the same everywhere.

/// Binary unit suffixes, smallest first
const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count as a human-readable size.
///
/// Values below 1 KB are shown as whole bytes; larger values use one decimal
/// place and 1024-based units.
///
/// # Examples
///
/// ```
/// use mediasync_common::human_size::format_human_size;
///
/// assert_eq!(format_human_size(0), "0 B");
/// assert_eq!(format_human_size(512), "512 B");
/// assert_eq!(format_human_size(1536), "1.5 KB");
/// assert_eq!(format_human_size(5 * 1024 * 1024), "5.0 MB");
/// ```
pub fn format_human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_below_one_kilobyte() {
        assert_eq!(format_human_size(1), "1 B");
        assert_eq!(format_human_size(1023), "1023 B");
    }

    #[test]
    fn test_kilobyte_boundary() {
        assert_eq!(format_human_size(1024), "1.0 KB");
    }

    #[test]
    fn test_gigabytes() {
        assert_eq!(format_human_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_largest_unit_caps_at_terabytes() {
        // 2048 TB stays in TB rather than inventing a larger unit
        assert_eq!(format_human_size(2048 * 1024_u64.pow(4)), "2048.0 TB");
    }
}
