//! Tinyfs Storage Library
//!
//! This crate provides a small, uniform file-system contract and the backends
//! that implement it: the local disk, an in-memory tree, and object storage.
//!
//! # Object-storage references
//!
//! Object storage has no directories. References of the form
//! `s3://bucket/dir/sub/leaf.ext` are parsed into a bucket and a key, and
//! directories are emulated over key prefixes:
//!
//! - a reference ending with `/` always names a directory;
//! - otherwise the last segment names a file when it has a non-empty
//!   extension;
//! - a directory may exist as a zero-length marker object whose key is the
//!   prefix itself.
//!
//! See the `s3::uri` module for the parser and the `s3::listing` module for
//! listing and recursive removal.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod path_utils;
pub mod s3;
pub mod stream;
pub mod traits;

// Re-export commonly used types
pub use factory::{backend_for_reference, create_storage, storage_for_reference};
#[cfg(feature = "storage-local")]
pub use local::LocalFileSystem;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryFileSystem;
pub use s3::client::{ObjectBody, ObjectClientError, ObjectStorageClient};
pub use s3::uri::ParsedLocation;
pub use s3::{InMemoryObjectClient, S3FileSystem};
#[cfg(feature = "storage-s3")]
pub use s3::AwsS3Client;
pub use tinyfs_core::{FileType, Reference, StorageBackend};
pub use traits::{
    AppendableFileSystem, ByteStream, ErrorKind, FileWriter, GlobFileSystem, LineStream,
    StorageError, StorageResult, TinyFileSystem,
};
