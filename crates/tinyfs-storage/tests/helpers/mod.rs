#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::sync::{Arc, Mutex};
use tinyfs_storage::s3::client::{ClientResult, ListObjectsPage};
use tinyfs_storage::{InMemoryObjectClient, ObjectBody, ObjectClientError, ObjectStorageClient, S3FileSystem};

/// A single call observed by [`RecordingClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get { bucket: String, key: String },
    Put { bucket: String, key: String, len: usize },
    Delete { bucket: String, key: String },
    Head { bucket: String, key: String },
    List { bucket: String, prefix: String, delimiter: String },
}

/// Injected failure for keys containing a fragment
struct Failure {
    fragment: String,
    http_status: Option<u16>,
    /// Failures left before the key succeeds again; `None` fails forever
    remaining: Option<usize>,
}

/// Object client that records every call before delegating to an in-memory
/// store, with optional failure injection
pub struct RecordingClient {
    inner: InMemoryObjectClient,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<Failure>>,
    stream_bodies: bool,
}

impl RecordingClient {
    pub fn new(inner: InMemoryObjectClient) -> Self {
        RecordingClient {
            inner,
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            stream_bodies: false,
        }
    }

    /// Serve object bodies as chunked streams instead of buffers
    pub fn with_stream_bodies(mut self) -> Self {
        self.stream_bodies = true;
        self
    }

    /// Fail every call whose key or prefix contains `fragment`
    pub fn fail_on(self, fragment: &str, http_status: Option<u16>) -> Self {
        self.failures.lock().unwrap().push(Failure {
            fragment: fragment.to_string(),
            http_status,
            remaining: None,
        });
        self
    }

    /// Fail only the first call whose key or prefix contains `fragment`
    pub fn fail_once(self, fragment: &str, http_status: Option<u16>) -> Self {
        self.failures.lock().unwrap().push(Failure {
            fragment: fragment.to_string(),
            http_status,
            remaining: Some(1),
        });
        self
    }

    pub fn inner(&self) -> &InMemoryObjectClient {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::List { .. }))
            .count()
    }

    pub fn get_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Get { .. }))
            .count()
    }

    pub fn put_calls(&self) -> Vec<(String, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Put { key, len, .. } => Some((key, len)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, key: &str) -> ClientResult<()> {
        let mut failures = self.failures.lock().unwrap();
        let active = failures
            .iter_mut()
            .find(|f| key.contains(&f.fragment) && f.remaining != Some(0));
        match active {
            Some(failure) => {
                if let Some(remaining) = failure.remaining.as_mut() {
                    *remaining -= 1;
                }
                Err(ObjectClientError::new(format!("GeneralError: {}", key))
                    .with_status(failure.http_status))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStorageClient for RecordingClient {
    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectBody> {
        self.record(Call::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.check(key)?;
        let body = self.inner.get_object(bucket, key).await?;
        match body {
            ObjectBody::Buffer(data) if self.stream_bodies => {
                // split in two chunks so consumers have to reassemble
                let mid = data.len() / 2;
                let chunks: Vec<std::io::Result<Bytes>> =
                    vec![Ok(data.slice(..mid)), Ok(data.slice(mid..))];
                Ok(ObjectBody::Stream(Box::pin(stream::iter(chunks))))
            }
            other => Ok(other),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ClientResult<()> {
        self.record(Call::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
            len: body.len(),
        });
        self.check(key)?;
        self.inner.put_object(bucket, key, body).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.record(Call::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.check(key)?;
        self.inner.delete_object(bucket, key).await
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.record(Call::Head {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        self.check(key)?;
        self.inner.head_object(bucket, key).await
    }

    async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> ClientResult<ListObjectsPage> {
        self.record(Call::List {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            delimiter: delimiter.to_string(),
        });
        self.check(prefix)?;
        self.inner.list_objects_v2(bucket, prefix, delimiter).await
    }
}

/// Bucket layout shared by the facade tests
pub fn seeded_store() -> InMemoryObjectClient {
    let store = InMemoryObjectClient::new();
    for (key, body) in [
        ("bar/", ""),
        ("bar/baz/", ""),
        ("bar/baz/test-file0.txt", "zero"),
        ("bar/test-file1.txt", "one"),
        ("foo/exists.txt", "test-file-data"),
    ] {
        store.insert("foobucket", key, Bytes::from(body)).unwrap();
    }
    store
}

/// Facade over a recording client; the client is returned for inspection
pub fn recording_fs(client: RecordingClient) -> (S3FileSystem, Arc<RecordingClient>) {
    let client = Arc::new(client);
    (S3FileSystem::new(client.clone()), client)
}
