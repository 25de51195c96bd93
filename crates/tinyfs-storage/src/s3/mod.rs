//! Object-storage backend.
//!
//! [`S3FileSystem`] resolves every reference through the URI parser, checks
//! that it names the right kind of entry, and then either forwards to a single
//! client call or to the directory emulation engine in [`listing`].

#[cfg(feature = "storage-s3")]
pub mod aws;
pub mod client;
pub mod listing;
pub mod memory_client;
pub mod uri;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::Instant;
use tinyfs_core::{FileType, Reference};

use crate::path_utils;
use crate::stream;
use crate::traits::{ByteStream, FileWriter, StorageError, StorageResult, TinyFileSystem};
use client::{ObjectBody, ObjectClientError, ObjectStorageClient};
use uri::ParsedLocation;

#[cfg(feature = "storage-s3")]
pub use aws::AwsS3Client;
pub use client::ListObjectsPage;
pub use memory_client::InMemoryObjectClient;
pub use uri::{build_uri, escape, is_valid_uri, parse, unescape};

const ID: &str = "S3TinyFileSystem";

/// Convert a client failure into the uniform error, keeping it as the cause.
pub(crate) fn client_error(
    operation: &str,
    bucket: &str,
    key: &str,
    err: ObjectClientError,
) -> StorageError {
    StorageError::wrap(
        format!(
            "[{}] {} failed for s3://{}/{}: {}",
            ID, operation, bucket, key, err
        ),
        err,
    )
}

/// Object-storage implementation of [`TinyFileSystem`]
///
/// The client is handed in explicitly; several file systems can share one.
#[derive(Clone)]
pub struct S3FileSystem {
    client: Arc<dyn ObjectStorageClient>,
}

impl S3FileSystem {
    pub fn new(client: Arc<dyn ObjectStorageClient>) -> Self {
        S3FileSystem { client }
    }

    pub fn client(&self) -> &Arc<dyn ObjectStorageClient> {
        &self.client
    }

    fn parse_file(&self, file_uri: &str, action: &str) -> StorageResult<ParsedLocation> {
        let parsed = uri::parse(file_uri)?;
        if !parsed.is_file() {
            return Err(StorageError::type_mismatch(format!(
                "[{}] Cannot {} with a directory url: {}",
                ID, action, file_uri
            )));
        }
        Ok(parsed)
    }

    fn parse_directory(&self, dir_uri: &str, action: &str) -> StorageResult<ParsedLocation> {
        let parsed = uri::parse(dir_uri)?;
        if !parsed.is_directory() {
            return Err(StorageError::type_mismatch(format!(
                "[{}] Cannot {} with a non-directory url: {}",
                ID, action, dir_uri
            )));
        }
        Ok(parsed)
    }

    async fn get_body(&self, parsed: &ParsedLocation) -> StorageResult<ObjectBody> {
        let start = Instant::now();
        let body = self
            .client
            .get_object(&parsed.bucket, &parsed.full_path)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %parsed.bucket,
                    key = %parsed.full_path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 get failed"
                );
                client_error("GetObject", &parsed.bucket, &parsed.full_path, e)
            })?;

        tracing::debug!(
            bucket = %parsed.bucket,
            key = %parsed.full_path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 get successful"
        );
        Ok(body)
    }

    async fn put(&self, parsed: &ParsedLocation, body: Bytes) -> StorageResult<()> {
        put_object(self.client.as_ref(), parsed, body).await
    }
}

async fn put_object(
    client: &dyn ObjectStorageClient,
    parsed: &ParsedLocation,
    body: Bytes,
) -> StorageResult<()> {
    let start = Instant::now();
    let size = body.len();

    client
        .put_object(&parsed.bucket, &parsed.full_path, body)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %parsed.bucket,
                key = %parsed.full_path,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 put failed"
            );
            client_error("PutObject", &parsed.bucket, &parsed.full_path, e)
        })?;

    tracing::debug!(
        bucket = %parsed.bucket,
        key = %parsed.full_path,
        size_bytes = size,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "S3 put successful"
    );
    Ok(())
}

#[async_trait]
impl TinyFileSystem for S3FileSystem {
    fn id(&self) -> &'static str {
        ID
    }

    async fn list_files(&self, dir_path: &str) -> StorageResult<Vec<Reference>> {
        let children = listing::list_directory(self.client.as_ref(), dir_path).await?;
        Ok(children.into_iter().map(Reference::ObjectUri).collect())
    }

    async fn get_file_type(&self, path: &str) -> StorageResult<FileType> {
        Ok(uri::parse(path)?.file_type)
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let parsed = uri::parse(path)?;
        match self.client.head_object(&parsed.bucket, &parsed.full_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(client_error(
                "HeadObject",
                &parsed.bucket,
                &parsed.full_path,
                e,
            )),
        }
    }

    async fn read_file(&self, file_path: &str) -> StorageResult<Bytes> {
        let parsed = self.parse_file(file_path, "read a file")?;
        match self.get_body(&parsed).await? {
            ObjectBody::Buffer(data) => Ok(data),
            ObjectBody::Stream(body) => {
                stream::read_stream_to_bytes(Box::pin(body.map_err(StorageError::from))).await
            }
        }
    }

    async fn write_file(&self, file_path: &str, data: Bytes) -> StorageResult<()> {
        let parsed = self.parse_file(file_path, "write a file")?;
        self.put(&parsed, data).await
    }

    async fn delete_file(&self, file_path: &str) -> StorageResult<()> {
        let parsed = self.parse_file(file_path, "delete a file")?;
        self.client
            .delete_object(&parsed.bucket, &parsed.full_path)
            .await
            .map_err(|e| client_error("DeleteObject", &parsed.bucket, &parsed.full_path, e))?;

        tracing::debug!(bucket = %parsed.bucket, key = %parsed.full_path, "S3 delete successful");
        Ok(())
    }

    async fn create_directory(&self, dir_path: &str) -> StorageResult<()> {
        let parsed = self.parse_directory(dir_path, "create a directory")?;
        self.put(&parsed, Bytes::new()).await
    }

    async fn remove_directory(&self, dir_path: &str) -> StorageResult<()> {
        let start = Instant::now();
        listing::remove_tree(self.client.as_ref(), dir_path).await?;
        tracing::info!(
            uri = %dir_path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 directory removed"
        );
        Ok(())
    }

    async fn file_read_stream(&self, file_path: &str) -> StorageResult<ByteStream> {
        let parsed = self.parse_file(file_path, "read a file")?;
        match self.get_body(&parsed).await? {
            ObjectBody::Buffer(data) => Ok(stream::once(data)),
            ObjectBody::Stream(body) => Ok(Box::pin(body.map_err(StorageError::from))),
        }
    }

    async fn file_write_stream(&self, file_path: &str) -> StorageResult<Box<dyn FileWriter>> {
        let parsed = self.parse_file(file_path, "write to a file")?;
        Ok(Box::new(S3FileWriter {
            client: self.client.clone(),
            location: parsed,
            buffer: BytesMut::new(),
            written: 0,
            closed: false,
        }))
    }

    async fn dir_name(&self, file_path: &str) -> StorageResult<Reference> {
        let parsed = uri::parse(file_path)?;
        Ok(Reference::ObjectUri(uri::build_uri(
            &parsed.bucket,
            Some(&parsed.path),
            None,
        )))
    }

    async fn file_name(&self, file_path: &str) -> StorageResult<String> {
        let parsed = uri::parse(file_path)?;
        parsed.file.ok_or_else(|| {
            StorageError::type_mismatch(format!(
                "[{}] Cannot get the file name of a directory url: {}",
                ID, file_path
            ))
        })
    }

    fn basename(&self, path: &str, suffix: Option<&str>) -> String {
        path_utils::basename(path, suffix)
    }

    fn join_path(&self, parts: &[&str]) -> StorageResult<Reference> {
        let Some((first, rest)) = parts.split_first() else {
            return Ok(Reference::Path(String::new()));
        };
        if first.is_empty() {
            return Ok(Reference::Path(String::new()));
        }

        if first.starts_with(tinyfs_core::constants::S3_PROTOCOL) {
            let parsed = uri::parse(first)?;
            let mut key_parts = vec![parsed.full_path.as_str()];
            key_parts.extend_from_slice(rest);
            let key = path_utils::join(&key_parts);
            let key = Some(key.as_str()).filter(|k| *k != ".");
            Ok(Reference::ObjectUri(uri::build_uri(&parsed.bucket, key, None)))
        } else {
            Ok(Reference::Path(path_utils::join(parts)))
        }
    }

    fn relative(&self, from: &str, to: &str) -> String {
        path_utils::relative(from, to)
    }

    fn extname(&self, path: &str) -> String {
        path_utils::extname(path)
    }

    fn is_absolute(&self, path: &str) -> bool {
        uri::is_valid_uri(path) || path_utils::is_absolute(path)
    }
}

/// Buffers written data and uploads it in a single put on close
struct S3FileWriter {
    client: Arc<dyn ObjectStorageClient>,
    location: ParsedLocation,
    buffer: BytesMut,
    written: u64,
    closed: bool,
}

#[async_trait]
impl FileWriter for S3FileWriter {
    async fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::backend(format!(
                "[{}] Write after close: {}",
                ID,
                self.location.to_uri()
            )));
        }
        self.buffer.extend_from_slice(data);
        self.written += data.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> StorageResult<()> {
        if self.closed {
            return Ok(());
        }
        // the buffer survives a failed put so close can be retried
        let body = self.buffer.clone().freeze();
        put_object(self.client.as_ref(), &self.location, body).await?;
        self.buffer.clear();
        self.closed = true;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}
