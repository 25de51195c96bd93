//! Object-storage client contract.
//!
//! The facade only needs five primitives from an object store. Anything that
//! can provide them (the AWS SDK, an in-process map, a test double) plugs in
//! through [`ObjectStorageClient`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

use crate::traits::BoxError;

/// Raw object content stream as produced by a client
pub type ObjectStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Body of a fetched object
///
/// Clients say up front which shape they produce, so the facade resolves
/// the body once instead of probing it.
pub enum ObjectBody {
    Stream(ObjectStream),
    Buffer(Bytes),
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectBody::Stream(_) => f.write_str("ObjectBody::Stream(..)"),
            ObjectBody::Buffer(b) => write!(f, "ObjectBody::Buffer({} bytes)", b.len()),
        }
    }
}

/// One page of a prefix + delimiter listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsPage {
    /// Prefixes of immediate subdirectories, in the order returned
    pub common_prefixes: Vec<String>,
    /// Keys of objects directly under the prefix, in the order returned
    pub keys: Vec<String>,
    /// More results exist beyond this page
    pub is_truncated: bool,
}

/// Error reported by an object-storage client
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ObjectClientError {
    /// HTTP status of the failed response, when the client received one
    pub http_status: Option<u16>,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl ObjectClientError {
    pub fn new(message: impl Into<String>) -> Self {
        ObjectClientError {
            http_status: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn not_found(key: &str) -> Self {
        Self::new(format!("NotFound: {}", key)).with_status(Some(404))
    }

    pub fn with_status(mut self, http_status: Option<u16>) -> Self {
        self.http_status = http_status;
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.source = Some(source.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.http_status == Some(404)
    }
}

pub type ClientResult<T> = Result<T, ObjectClientError>;

/// Minimal object-storage client used by the S3 facade
#[async_trait]
pub trait ObjectStorageClient: Send + Sync {
    /// Fetch an object's content
    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectBody>;

    /// Store an object; an empty body creates a zero-length marker
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ClientResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()>;

    /// Probe an object's existence; a missing object fails with status 404
    async fn head_object(&self, bucket: &str, key: &str) -> ClientResult<()>;

    /// List one page of keys and common prefixes under `prefix`
    async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> ClientResult<ListObjectsPage>;
}
