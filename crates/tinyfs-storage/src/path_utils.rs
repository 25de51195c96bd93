//! POSIX path string helpers.
//!
//! These operate on plain strings and never touch a filesystem. Joining and
//! normalizing collapse doubled separators, drop `.` segments and resolve `..`
//! segments, and keep a trailing separator when the input had one.

use tinyfs_core::constants::{SEPARATOR, SEPARATOR_STR};

/// Normalize a path: collapse separators, resolve `.` and `..`.
///
/// An empty result becomes `.`. A trailing separator on the input is kept.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with(SEPARATOR);
    let trailing = path.ends_with(SEPARATOR);
    let segments = resolve_segments(path, absolute);

    let mut out = segments.join(SEPARATOR_STR);
    if absolute {
        out.insert(0, SEPARATOR);
    }
    if out.is_empty() {
        out.push('.');
    }
    if trailing && !out.ends_with(SEPARATOR) {
        out.push(SEPARATOR);
    }
    out
}

/// Join the non-empty parts with a separator and normalize the result.
pub fn join(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(SEPARATOR_STR);

    if joined.is_empty() {
        return ".".to_string();
    }
    normalize(&joined)
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// Directory portion of a path (`/a/b/c.txt` -> `/a/b`).
pub fn dirname(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with(SEPARATOR);
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return SEPARATOR_STR.to_string();
    }

    match trimmed.rfind(SEPARATOR) {
        None => ".".to_string(),
        Some(idx) => {
            let parent = trimmed[..idx].trim_end_matches(SEPARATOR);
            if parent.is_empty() {
                if absolute {
                    SEPARATOR_STR.to_string()
                } else {
                    ".".to_string()
                }
            } else {
                parent.to_string()
            }
        }
    }
}

/// Last component of a path, ignoring trailing separators.
///
/// When `suffix` is given and the component ends with it (without being equal
/// to it), the suffix is removed.
pub fn basename(path: &str, suffix: Option<&str>) -> String {
    let trimmed = path.trim_end_matches(SEPARATOR);
    let base = match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };

    match suffix {
        Some(suffix) if !suffix.is_empty() && base != suffix => {
            base.strip_suffix(suffix).unwrap_or(base).to_string()
        }
        _ => base.to_string(),
    }
}

/// Extension of the last component including the dot; empty when there is
/// none. A leading dot (hidden file) does not start an extension.
pub fn extname(path: &str) -> String {
    let base = basename(path, None);
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => base[idx..].to_string(),
    }
}

/// Relative path from `from` to `to`, after normalizing both.
///
/// Relative inputs are treated as if resolved against the same working
/// directory, so only their common structure matters.
pub fn relative(from: &str, to: &str) -> String {
    let from_segments = resolve_segments(from, is_absolute(from));
    let to_segments = resolve_segments(to, is_absolute(to));

    let common = from_segments
        .iter()
        .zip(to_segments.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    parts.extend(std::iter::repeat("..").take(from_segments.len() - common));
    parts.extend(to_segments[common..].iter().map(String::as_str));
    parts.join(SEPARATOR_STR)
}

fn resolve_segments(path: &str, absolute: bool) -> Vec<String> {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..".to_string());
                }
            }
            other => segments.push(other.to_string()),
        }
    }
    segments
}
