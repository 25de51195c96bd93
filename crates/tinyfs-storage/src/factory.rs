#[cfg(feature = "storage-local")]
use crate::LocalFileSystem;
#[cfg(feature = "storage-memory")]
use crate::MemoryFileSystem;
use crate::s3::{self, S3FileSystem};
use crate::{StorageBackend, StorageError, StorageResult, TinyFileSystem};
use std::sync::Arc;
use tinyfs_core::Config;

/// Create a storage backend based on configuration
pub async fn create_storage(
    config: &Config,
    backend: StorageBackend,
) -> StorageResult<Arc<dyn TinyFileSystem>> {
    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let client = s3::AwsS3Client::from_config(config).await;
            Ok(Arc::new(S3FileSystem::new(Arc::new(client))))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::backend(
            "S3 storage backend not available (storage-s3 feature not enabled)",
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => Ok(Arc::new(LocalFileSystem::new())),

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::backend(
            "Local storage backend not available (storage-local feature not enabled)",
        )),

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => Ok(Arc::new(MemoryFileSystem::new(&config.memory_cwd))),

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => Err(StorageError::backend(
            "Memory storage backend not available (storage-memory feature not enabled)",
        )),
    }
}

/// Backend kind that handles a reference: object URIs go to S3, anything
/// else to the configured path backend
pub fn backend_for_reference(config: &Config, reference: &str) -> StorageBackend {
    if s3::is_valid_uri(reference) {
        StorageBackend::S3
    } else {
        config.path_backend
    }
}

/// Create the backend that handles `reference`
pub async fn storage_for_reference(
    config: &Config,
    reference: &str,
) -> StorageResult<Arc<dyn TinyFileSystem>> {
    config
        .validate()
        .map_err(|e| StorageError::backend(format!("Invalid storage configuration: {}", e)))?;

    let backend = backend_for_reference(config, reference);
    tracing::debug!(reference = %reference, backend = %backend, "Selected storage backend");
    create_storage(config, backend).await
}
