//! Constants shared across tinyfs crates.

/// Scheme token of object-storage URIs (`s3://bucket/key`).
pub const S3_SCHEME: &str = "s3";

/// Scheme token with its trailing colon, as reported by URI parsers.
pub const S3_PROTOCOL: &str = "s3:";

/// Leading token that marks a reference as an object-storage URI.
pub const S3_URI_PREFIX: &str = "s3://";

/// Hierarchy separator used by object keys and POSIX paths.
pub const SEPARATOR: char = '/';

/// Separator as a string slice, for joins and splits.
pub const SEPARATOR_STR: &str = "/";
