//! In-process object store
//!
//! A flat key namespace per bucket with S3 listing semantics: keys sorted
//! lexicographically, prefix + delimiter grouping into common prefixes, and a
//! page size past which listings report truncation.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::client::{ClientResult, ListObjectsPage, ObjectBody, ObjectClientError, ObjectStorageClient};

const DEFAULT_PAGE_SIZE: usize = 1000;

type Buckets = HashMap<String, BTreeMap<String, Bytes>>;

/// In-memory object-storage client
///
/// All data is lost when the client is dropped.
pub struct InMemoryObjectClient {
    buckets: RwLock<Buckets>,
    page_size: usize,
}

impl Default for InMemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectClient {
    pub fn new() -> Self {
        InMemoryObjectClient {
            buckets: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit the number of entries (keys plus common prefixes) per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_bucket(self, bucket: &str) -> ClientResult<Self> {
        self.create_bucket(bucket)?;
        Ok(self)
    }

    pub fn create_bucket(&self, bucket: &str) -> ClientResult<()> {
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| ObjectClientError::new("Lock poisoned"))?;
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    /// Seed an object directly, creating the bucket if needed
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) -> ClientResult<()> {
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| ObjectClientError::new("Lock poisoned"))?;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), body.into());
        Ok(())
    }

    /// All keys currently stored in a bucket, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .ok()
            .and_then(|buckets| buckets.get(bucket).map(|objects| objects.keys().cloned().collect()))
            .unwrap_or_default()
    }

    fn read_bucket<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&BTreeMap<String, Bytes>) -> ClientResult<T>,
    ) -> ClientResult<T> {
        let buckets = self
            .buckets
            .read()
            .map_err(|_| ObjectClientError::new("Lock poisoned"))?;
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        f(objects)
    }

    fn write_bucket<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&mut BTreeMap<String, Bytes>) -> T,
    ) -> ClientResult<T> {
        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| ObjectClientError::new("Lock poisoned"))?;
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        Ok(f(objects))
    }
}

fn no_such_bucket(bucket: &str) -> ObjectClientError {
    ObjectClientError::new(format!("NoSuchBucket: {}", bucket)).with_status(Some(404))
}

#[async_trait]
impl ObjectStorageClient for InMemoryObjectClient {
    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectBody> {
        self.read_bucket(bucket, |objects| {
            objects
                .get(key)
                .cloned()
                .map(ObjectBody::Buffer)
                .ok_or_else(|| ObjectClientError::not_found(key))
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ClientResult<()> {
        self.write_bucket(bucket, |objects| {
            objects.insert(key.to_string(), body);
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        // deleting a missing key succeeds, as it does on S3
        self.write_bucket(bucket, |objects| {
            objects.remove(key);
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.read_bucket(bucket, |objects| {
            if objects.contains_key(key) {
                Ok(())
            } else {
                Err(ObjectClientError::not_found(key))
            }
        })
    }

    async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> ClientResult<ListObjectsPage> {
        let page_size = self.page_size;
        self.read_bucket(bucket, |objects| {
            let mut page = ListObjectsPage::default();
            let mut entries = 0;

            for key in objects
                .range(prefix.to_string()..)
                .map(|(key, _)| key)
                .take_while(|key| key.starts_with(prefix))
            {
                let rest = &key[prefix.len()..];
                let common_prefix = if delimiter.is_empty() {
                    None
                } else {
                    rest.find(delimiter)
                        .map(|idx| format!("{}{}", prefix, &rest[..idx + delimiter.len()]))
                };

                if let Some(common_prefix) = common_prefix {
                    if page.common_prefixes.last() == Some(&common_prefix) {
                        continue;
                    }
                    if entries == page_size {
                        page.is_truncated = true;
                        break;
                    }
                    page.common_prefixes.push(common_prefix);
                } else {
                    if entries == page_size {
                        page.is_truncated = true;
                        break;
                    }
                    page.keys.push(key.clone());
                }
                entries += 1;
            }

            Ok(page)
        })
    }
}
