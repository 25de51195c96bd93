//! Opaque references to files and directories.
//!
//! A reference is either a backend-local path or an object-storage URI. The
//! form is decided by the leading scheme token alone; nothing else about the
//! string is inspected here. Full validation of URIs is the job of the
//! storage crate's URI parser.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::constants::S3_URI_PREFIX;

/// A file or directory reference in some backend's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reference {
    /// Backend-local path, e.g. `/var/data/report.csv` or `reports/`.
    Path(String),
    /// Object-storage URI, e.g. `s3://bucket/reports/report.csv`.
    ObjectUri(String),
}

impl Reference {
    /// Classify a raw string by its leading scheme token.
    pub fn classify(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.starts_with(S3_URI_PREFIX) {
            Reference::ObjectUri(s)
        } else {
            Reference::Path(s)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Reference::Path(s) | Reference::ObjectUri(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Reference::Path(s) | Reference::ObjectUri(s) => s,
        }
    }

    pub fn is_object_uri(&self) -> bool {
        matches!(self, Reference::ObjectUri(_))
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.into_string()
    }
}

impl AsRef<str> for Reference {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_scheme_token() {
        assert!(Reference::classify("s3://bucket/a.txt").is_object_uri());
        assert!(Reference::classify("s3://").is_object_uri());
        assert!(!Reference::classify("/tmp/a.txt").is_object_uri());
        assert!(!Reference::classify("s3:/bucket").is_object_uri());
        assert!(!Reference::classify("http://bucket/a.txt").is_object_uri());
    }

    #[test]
    fn keeps_the_underlying_string() {
        let r = Reference::classify("s3://bucket/dir/");
        assert_eq!(r.as_str(), "s3://bucket/dir/");
        assert_eq!(r.to_string(), "s3://bucket/dir/");
        assert_eq!(String::from(r), "s3://bucket/dir/");
    }

    #[test]
    fn serializes_with_discriminant() {
        let json = serde_json::to_string(&Reference::Path("a/b".to_string())).unwrap();
        assert_eq!(json, r#"{"kind":"path","value":"a/b"}"#);
    }
}
