use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::error::Error as StdError;
use tinyfs_core::Config;
use tokio_util::io::ReaderStream;

use super::client::{ClientResult, ListObjectsPage, ObjectBody, ObjectClientError, ObjectStorageClient};

/// [`ObjectStorageClient`] backed by the AWS SDK
#[derive(Clone)]
pub struct AwsS3Client {
    client: Client,
}

impl AwsS3Client {
    pub fn new(client: Client) -> Self {
        AwsS3Client { client }
    }

    /// Build a client from the runtime configuration
    ///
    /// Region falls back to the SDK's default provider chain. A custom
    /// endpoint targets S3-compatible providers such as MinIO.
    pub async fn from_config(config: &Config) -> Self {
        let region_provider = RegionProviderChain::first_try(
            config
                .s3_region()
                .map(|region| aws_config::Region::new(region.to_string())),
        )
        .or_default_provider();

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.s3_force_path_style);
        if let Some(endpoint) = config.s3_endpoint() {
            // path-style addressing is what most S3-compatible providers expect
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            region = ?sdk_config.region(),
            endpoint = ?config.s3_endpoint(),
            "S3 client configured"
        );

        AwsS3Client {
            client: Client::from_conf(builder.build()),
        }
    }
}

fn sdk_error<E>(operation: &str, err: SdkError<E, HttpResponse>) -> ObjectClientError
where
    E: StdError + Send + Sync + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    ObjectClientError::new(format!("{}: {}", operation, DisplayErrorContext(&err)))
        .with_status(status)
        .with_source(err)
}

#[async_trait]
impl ObjectStorageClient for AwsS3Client {
    async fn get_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectBody> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("GetObject", e))?;

        let reader = response.body.into_async_read();
        Ok(ObjectBody::Stream(Box::pin(ReaderStream::new(reader))))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> ClientResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", e))?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("DeleteObject", e))?;
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("HeadObject", e))?;
        Ok(())
    }

    async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> ClientResult<ListObjectsPage> {
        let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if !delimiter.is_empty() {
            request = request.delimiter(delimiter);
        }
        let response = request
            .send()
            .await
            .map_err(|e| sdk_error("ListObjectsV2", e))?;

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(str::to_string))
            .collect();
        let keys = response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();

        Ok(ListObjectsPage {
            common_prefixes,
            keys,
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }
}
