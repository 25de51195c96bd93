//! Storage abstraction trait
//!
//! This module defines the `TinyFileSystem` trait that all backends implement,
//! together with the uniform error every operation reports.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::pin::Pin;
use thiserror::Error;
use tinyfs_core::{FileType, Reference};

use crate::stream;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a storage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The reference could not be parsed as a URI at all.
    InvalidUri,
    /// The URI uses a scheme other than the object-storage one.
    WrongProtocol,
    /// The URI has no bucket (authority) component.
    MissingBucket,
    /// The bucket component is not all-lowercase.
    MixedCaseBucket,
    /// The reference resolves to a directory where a file is required, or
    /// the other way round.
    TypeMismatch,
    /// A single listing page did not hold the whole directory.
    ListingTruncated,
    /// Any other I/O, network, or SDK failure.
    BackendFailure,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ErrorKind::InvalidUri => "InvalidUri",
            ErrorKind::WrongProtocol => "WrongProtocol",
            ErrorKind::MissingBucket => "MissingBucket",
            ErrorKind::MixedCaseBucket => "MixedCaseBucket",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::ListingTruncated => "ListingTruncated",
            ErrorKind::BackendFailure => "BackendFailure",
        };
        f.write_str(name)
    }
}

/// Uniform storage error: a kind tag, a message, and the underlying cause
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StorageError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<BoxError>,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        StorageError {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap any error value as a `BackendFailure`, keeping it as the cause.
    pub fn wrap<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        StorageError {
            kind: ErrorKind::BackendFailure,
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.cause = Some(cause.into());
        self
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BackendFailure, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::wrap(err.to_string(), err)
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stream of file content chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Stream of text lines, without their terminators
pub type LineStream = Pin<Box<dyn Stream<Item = StorageResult<String>> + Send>>;

/// Streaming write handle
///
/// Data handed to `write` is only guaranteed to be persisted once `close`
/// has returned successfully.
#[async_trait]
pub trait FileWriter: Send {
    /// Write a chunk of data
    async fn write(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Flush and close the handle
    async fn close(&mut self) -> StorageResult<()>;

    /// Bytes accepted so far
    fn bytes_written(&self) -> u64;
}

/// Storage abstraction trait
///
/// All backends (object storage, local disk, in-memory) implement this trait,
/// so callers can work against any of them through opaque references.
#[async_trait]
pub trait TinyFileSystem: Send + Sync {
    /// Identifier of the implementation, e.g. `S3TinyFileSystem`
    fn id(&self) -> &'static str;

    /// List the immediate children of the given directory
    async fn list_files(&self, dir_path: &str) -> StorageResult<Vec<Reference>>;

    /// Resolve the type of the given file or directory
    async fn get_file_type(&self, path: &str) -> StorageResult<FileType>;

    /// Check if the given file or directory exists
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Read the whole content of a file
    async fn read_file(&self, file_path: &str) -> StorageResult<Bytes>;

    /// Write data into a file, replacing any previous content
    async fn write_file(&self, file_path: &str, data: Bytes) -> StorageResult<()>;

    /// Delete a file
    async fn delete_file(&self, file_path: &str) -> StorageResult<()>;

    /// Create a directory; parent directories are created as needed
    async fn create_directory(&self, dir_path: &str) -> StorageResult<()>;

    /// Remove a directory together with everything below it
    async fn remove_directory(&self, dir_path: &str) -> StorageResult<()>;

    /// Open a file for streaming read
    async fn file_read_stream(&self, file_path: &str) -> StorageResult<ByteStream>;

    /// Open a file for line-by-line reading
    async fn file_line_stream(&self, file_path: &str) -> StorageResult<LineStream> {
        let bytes = self.file_read_stream(file_path).await?;
        Ok(stream::lines(bytes))
    }

    /// Open a file for streaming write (create or truncate)
    async fn file_write_stream(&self, file_path: &str) -> StorageResult<Box<dyn FileWriter>>;

    /// Parent directory of the given file
    async fn dir_name(&self, file_path: &str) -> StorageResult<Reference>;

    /// File name component of the given file path
    async fn file_name(&self, file_path: &str) -> StorageResult<String>;

    /// Last component of a file or directory path, minus an optional suffix
    fn basename(&self, path: &str, suffix: Option<&str>) -> String;

    /// Join path parts into a single reference
    fn join_path(&self, parts: &[&str]) -> StorageResult<Reference>;

    /// Relative path leading from `from` to `to`
    fn relative(&self, from: &str, to: &str) -> String;

    /// Extension of the last path component, including the dot (`.csv`)
    fn extname(&self, path: &str) -> String;

    /// Whether the given path is absolute
    fn is_absolute(&self, path: &str) -> bool;
}

/// Backends that can open a file for appending
#[async_trait]
pub trait AppendableFileSystem: TinyFileSystem {
    async fn file_append_stream(&self, file_path: &str) -> StorageResult<Box<dyn FileWriter>>;
}

/// Backends that can expand glob patterns
#[async_trait]
pub trait GlobFileSystem: TinyFileSystem {
    /// Regular files matching the pattern
    async fn glob(&self, pattern: &str) -> StorageResult<Vec<Reference>>;
}
