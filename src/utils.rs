//! Utility functions for file names and path manipulation

use std::path::{Component, Path, PathBuf};

/// Maximum length of a single file name in bytes
pub const MAX_FILENAME_BYTES: usize = 255;

/// Suffix appended to the final path while the raw download is in progress
pub const TEMP_SUFFIX: &str = "tmp";

/// Characters rejected by at least one common host filesystem
const INVALID_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Device names Windows refuses as file stems
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Repair a single file name so it is valid on common host filesystems
///
/// A name that is already valid is returned unchanged. Otherwise:
/// - invalid characters (`/ \ : * ? " < > |`) and control characters are removed
/// - the name is truncated to 255 bytes on a character boundary
/// - leading whitespace and trailing whitespace or dots are stripped
/// - a reserved device stem (`CON`, `NUL`, `COM1`, ...) gets an `_` appended
///
/// The transform is idempotent and never fails. It may return an empty string
/// (e.g. for `"???"` or `".."`), which callers must treat as unusable.
///
/// # Examples
///
/// ```
/// use bulk_audio_dl::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Song A"), "Song A");
/// assert_eq!(sanitize_filename("AC/DC: Live?"), "ACDC Live");
/// assert_eq!(sanitize_filename("con.mp3"), "con_.mp3");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let filtered: String = name
        .chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();

    let cleaned = trim_name(truncate_bytes(&filtered, MAX_FILENAME_BYTES));

    let stem = cleaned.split('.').next().unwrap_or_default();
    if is_reserved_stem(stem) {
        let suffixed = format!("{}_{}", stem, &cleaned[stem.len()..]);
        return trim_name(truncate_bytes(&suffixed, MAX_FILENAME_BYTES)).to_string();
    }

    cleaned.to_string()
}

/// Repair every component of a path with [`sanitize_filename`]
///
/// Root, prefix, `.` and `..` components are preserved. Components that sanitize
/// to an empty name are dropped, so the result may be an empty path.
///
/// # Examples
///
/// ```
/// use bulk_audio_dl::utils::sanitize_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     sanitize_path(Path::new("/music/Best of: 2020")),
///     PathBuf::from("/music/Best of 2020")
/// );
/// ```
pub fn sanitize_path(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => {
                let name = sanitize_filename(&name.to_string_lossy());
                if !name.is_empty() {
                    clean.push(name);
                }
            }
            other => clean.push(other.as_os_str()),
        }
    }
    clean
}

/// Temporary download path for a final output path (`<output>.tmp`)
pub fn temp_path_for(output_path: &Path) -> PathBuf {
    let mut name = output_path.as_os_str().to_owned();
    name.push(".");
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn trim_name(s: &str) -> &str {
    s.trim_start()
        .trim_end_matches(|c: char| c.is_whitespace() || c == '.')
}

fn is_reserved_stem(stem: &str) -> bool {
    RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
}
