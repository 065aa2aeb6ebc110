//! Output file naming for capture sessions.
//!
//! Recordings are named `<source>_<YYYY>-<MM>-<DD>_<HH>-<MM>-<SS>.<ext>`
//! using local time at the moment the capture is launched.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Timestamp layout used in capture file names.
pub const CAPTURE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Characters rejected by at least one supported file system.
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows refuses as file stems.
const RESERVED_STEMS: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Make a source identifier safe to embed in a file name.
///
/// Ordinary identifiers (letters, digits, `_`, `-`) pass through untouched.
/// Separators and other invalid characters become `_`, runs of them collapse
/// into one, and leading/trailing dots and spaces are dropped.
///
/// ```
/// use srec_lite::utils::filename::sanitize_filename;
///
/// assert_eq!(sanitize_filename("alice"), "alice");
/// assert_eq!(sanitize_filename("../etc/passwd"), "_etc_passwd");
/// assert_eq!(sanitize_filename(""), "unnamed");
/// ```
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut replaced = false;

    for c in input.chars() {
        if c.is_control() || INVALID_CHARS.contains(&c) {
            if !replaced {
                out.push('_');
            }
            replaced = true;
        } else {
            out.push(c);
            replaced = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }

    let stem = trimmed.split('.').next().unwrap_or(trimmed);
    if RESERVED_STEMS
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
    {
        return format!("_{trimmed}");
    }

    trimmed.to_string()
}

/// Build the file name for a capture of `source` started at `started_at`.
pub fn capture_filename(source: &str, started_at: DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitize_filename(source),
        started_at.format(CAPTURE_TIMESTAMP_FORMAT),
        extension.trim_start_matches('.')
    )
}

/// Full output path for a capture inside `output_dir`.
pub fn capture_path(
    output_dir: &Path,
    source: &str,
    started_at: DateTime<Local>,
    extension: &str,
) -> PathBuf {
    output_dir.join(capture_filename(source, started_at, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
    }

    #[test]
    fn test_capture_filename_layout() {
        let name = capture_filename("alice", at(2024, 3, 7, 9, 5, 2), "mp4");
        assert_eq!(name, "alice_2024-03-07_09-05-02.mp4");
    }

    #[test]
    fn test_capture_filename_accepts_dotted_extension() {
        let name = capture_filename("bob", at(2023, 12, 31, 23, 59, 59), ".mkv");
        assert_eq!(name, "bob_2023-12-31_23-59-59.mkv");
    }

    #[test]
    fn test_capture_path_joins_output_dir() {
        let path = capture_path(Path::new("/rec"), "alice", at(2024, 1, 1, 0, 0, 0), "mp4");
        assert_eq!(path, PathBuf::from("/rec/alice_2024-01-01_00-00-00.mp4"));
    }

    #[test]
    fn test_plain_identifiers_unchanged() {
        assert_eq!(sanitize_filename("alice_99"), "alice_99");
        assert_eq!(sanitize_filename("some-model"), "some-model");
    }

    #[test]
    fn test_separators_replaced_and_collapsed() {
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("a<>:|b"), "a_b");
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
    }

    #[test]
    fn test_reserved_stems_prefixed() {
        assert_eq!(sanitize_filename("con"), "_con");
        assert_eq!(sanitize_filename("LPT1.x"), "_LPT1.x");
        assert_eq!(sanitize_filename("console"), "console");
    }

    #[test]
    fn test_empty_after_trim() {
        assert_eq!(sanitize_filename(" .. "), "unnamed");
    }
}
