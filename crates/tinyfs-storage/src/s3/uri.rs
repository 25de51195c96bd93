//! Object-storage URI model, escaper, and parser.
//!
//! Object storage has a flat key namespace. These functions map between
//! `s3://bucket/dir/sub/leaf.ext` URIs and the bucket/key pair a storage
//! client needs, deciding along the way whether the URI names a file or an
//! emulated directory.
//!
//! Key layout produced by [`parse`]:
//!
//! - `path` is empty or ends with exactly one `/`, with no leading or doubled
//!   separators.
//! - `file` is present only for file URIs.
//! - `full_path` is the literal key passed to the storage client.

use serde::Serialize;
use tinyfs_core::constants::{S3_PROTOCOL, S3_SCHEME, SEPARATOR, SEPARATOR_STR};
use tinyfs_core::FileType;
use url::Url;

use crate::path_utils;
use crate::traits::{ErrorKind, StorageError, StorageResult};

/// Structured decomposition of an object-storage URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedLocation {
    pub bucket: String,
    /// Directory prefix; empty or ending with a single `/`.
    pub path: String,
    /// Leaf name, present iff `file_type` is `File`.
    pub file: Option<String>,
    pub file_type: FileType,
    /// Storage key: `path` followed by `file` when present.
    pub full_path: String,
}

impl ParsedLocation {
    pub fn is_file(&self) -> bool {
        self.file_type.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.file_type.is_directory()
    }

    /// URI addressing this location again.
    pub fn to_uri(&self) -> String {
        build_uri(&self.bucket, Some(&self.path), self.file.as_deref())
    }
}

/// Escape a path for use inside a URI.
///
/// Spaces become `+`, `+` becomes `%2B`, and `%` becomes `%25`. This is a
/// single pass over the input, so produced escapes are never re-escaped.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            ' ' => out.push('+'),
            '+' => out.push_str("%2B"),
            '%' => out.push_str("%25"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape`]: `+` decodes to a space, percent escapes decode to
/// their bytes.
///
/// A `%` not followed by two hex digits is rejected.
pub fn unescape(s: &str) -> StorageResult<String> {
    let bytes = s.as_bytes();
    let malformed = bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    });
    if malformed {
        return Err(StorageError::new(
            ErrorKind::InvalidUri,
            format!("[s3-uri] Malformed percent escape in URI component: {}", s),
        ));
    }

    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| {
            StorageError::new(
                ErrorKind::InvalidUri,
                format!("[s3-uri] Could not decode URI component: {}", s),
            )
            .with_cause(e)
        })
}

/// Unescape one path segment; a decoded separator would change the key layout.
fn unescape_segment(segment: &str) -> StorageResult<String> {
    let decoded = unescape(segment)?;
    if decoded.contains(SEPARATOR) {
        return Err(StorageError::new(
            ErrorKind::InvalidUri,
            format!("[s3-uri] Path segment contains an encoded separator: {}", segment),
        ));
    }
    Ok(decoded)
}

/// Percent-encode what the URL parser would read as a query or fragment
/// delimiter, or strip as a control character.
fn encode_url_delimiters(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '#' || c == '?' || c.is_ascii_control() {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Remove one trailing separator, if present.
pub fn trim_trailing_separator(s: &str) -> &str {
    s.strip_suffix(SEPARATOR).unwrap_or(s)
}

/// Build an object-storage URI from its parts.
///
/// `dir_path` defaults to the bucket root and `leaf` to nothing. Parts are
/// joined with separator collapsing, so a leading `/` on `dir_path` is
/// ignored; calling with only a bucket yields `s3://bucket/`. On top of
/// [`escape`], `#`, `?` and control characters are percent-encoded so that
/// [`parse`] reads them back as part of the key.
pub fn build_uri(bucket: &str, dir_path: Option<&str>, leaf: Option<&str>) -> String {
    let dir_path = dir_path.filter(|p| !p.is_empty()).unwrap_or(SEPARATOR_STR);
    let leaf = leaf.unwrap_or("");
    let joined = path_utils::join(&[bucket, dir_path, leaf]);
    format!("{}//{}", S3_PROTOCOL, encode_url_delimiters(&escape(&joined)))
}

/// Whether a path segment looks like a file name: it has a non-empty suffix
/// after its last dot.
pub fn is_file_name(segment: &str) -> bool {
    segment
        .rfind('.')
        .is_some_and(|idx| idx + 1 < segment.len())
}

/// Check scheme, bucket presence, and bucket case without failing.
pub fn is_valid_uri(s: &str) -> bool {
    Url::parse(s)
        .ok()
        .and_then(|url| validate_authority(&url, s).ok())
        .is_some()
}

/// Parse and validate an object-storage URI.
pub fn parse(uri: &str) -> StorageResult<ParsedLocation> {
    let url = Url::parse(uri).map_err(|e| {
        StorageError::new(
            ErrorKind::InvalidUri,
            format!("[s3-uri] Invalid URL: {}", uri),
        )
        .with_cause(e)
    })?;
    let bucket = validate_authority(&url, uri)?;

    let pathname = if url.path().is_empty() {
        SEPARATOR_STR
    } else {
        url.path()
    };
    // a trailing separator always means a directory, whatever the last segment looks like
    let names_directory = pathname.ends_with(SEPARATOR);
    let pathname = trim_trailing_separator(pathname);
    let pathname = pathname.strip_prefix(SEPARATOR).unwrap_or(pathname);

    let mut segments: Vec<&str> = pathname.split(SEPARATOR).collect();
    // split always yields at least one (possibly empty) segment
    let leaf = segments.pop().unwrap_or_default();

    let file = if !names_directory && is_file_name(leaf) {
        Some(unescape_segment(leaf)?)
    } else {
        segments.push(leaf);
        None
    };

    let dir_segments = segments
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .map(unescape_segment)
        .collect::<StorageResult<Vec<_>>>()?;

    let mut path = dir_segments.join(SEPARATOR_STR);
    if !path.is_empty() {
        path.push(SEPARATOR);
    }

    let full_path = match file {
        Some(ref file) => format!("{}{}", path, file),
        None => path.clone(),
    };
    let file_type = if file.is_some() {
        FileType::File
    } else {
        FileType::Directory
    };

    Ok(ParsedLocation {
        bucket,
        path,
        file,
        file_type,
        full_path,
    })
}

fn validate_authority(url: &Url, raw: &str) -> StorageResult<String> {
    if url.scheme() != S3_SCHEME {
        return Err(StorageError::new(
            ErrorKind::WrongProtocol,
            format!(
                "[s3-uri] Incorrect protocol, expected {}: {}",
                S3_PROTOCOL, raw
            ),
        ));
    }

    let host = url.host_str().unwrap_or("");
    if host.is_empty() {
        return Err(StorageError::new(
            ErrorKind::MissingBucket,
            format!("[s3-uri] Could not determine bucket name: {}", raw),
        ));
    }

    if host != host.to_lowercase() {
        return Err(StorageError::new(
            ErrorKind::MixedCaseBucket,
            format!(
                "[s3-uri] S3 URLs must have a lower case bucket component (note that S3 itself is case sensitive): {}",
                raw
            ),
        ));
    }

    Ok(host.to_string())
}
