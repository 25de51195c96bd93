//! Directory emulation over a flat key namespace.
//!
//! Directories exist only as key prefixes (plus an optional zero-length
//! marker object whose key is the prefix itself). Listing asks the store for
//! one delimiter-grouped page; removal walks the tree depth-first and deletes
//! children before the marker of their parent.

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::time::Instant;
use tinyfs_core::constants::{SEPARATOR, SEPARATOR_STR};

use super::client::ObjectStorageClient;
use super::uri::{self, ParsedLocation};
use super::client_error;
use crate::traits::{ErrorKind, StorageError, StorageResult};

/// Full URIs of the immediate children of a directory URI.
///
/// Subdirectories come first, then files, each in the order the store
/// returned them. Subdirectory URIs end with a separator
/// (`s3://bucket/dir/`, never the bare `s3://bucket/dir`), so re-parsing one
/// always yields a directory even when its name has an extension (`v1.0/`).
pub async fn list_directory(
    client: &dyn ObjectStorageClient,
    dir_uri: &str,
) -> StorageResult<Vec<String>> {
    let parsed = uri::parse(dir_uri)?;
    if !parsed.is_directory() {
        return Err(StorageError::type_mismatch(format!(
            "[S3TinyFileSystem] Cannot list files with a non-directory url: {}",
            dir_uri
        )));
    }

    let start = Instant::now();
    let page = client
        .list_objects_v2(&parsed.bucket, &parsed.path, SEPARATOR_STR)
        .await
        .map_err(|e| client_error("ListObjectsV2", &parsed.bucket, &parsed.path, e))?;

    if page.is_truncated {
        tracing::error!(
            bucket = %parsed.bucket,
            prefix = %parsed.path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 listing truncated"
        );
        return Err(StorageError::new(
            ErrorKind::ListingTruncated,
            format!("[S3TinyFileSystem] Error: listing is truncated: {}", dir_uri),
        ));
    }

    let directories = page
        .common_prefixes
        .iter()
        .filter_map(|prefix| child_name(&parsed.path, prefix))
        .map(|name| child_uri(&parsed, &format!("{}{}", name, SEPARATOR)));
    let files = page
        .keys
        .iter()
        .filter_map(|key| child_name(&parsed.path, key))
        .map(|name| child_uri(&parsed, name));
    let children: Vec<String> = directories.chain(files).collect();

    tracing::debug!(
        bucket = %parsed.bucket,
        prefix = %parsed.path,
        children = children.len(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "S3 listing successful"
    );

    Ok(children)
}

/// Remove an emulated directory and everything below it.
///
/// Children at each level are purged concurrently; the first failure aborts
/// the removal. The directory's own marker is deleted last.
pub fn remove_tree<'a>(
    client: &'a dyn ObjectStorageClient,
    dir_uri: &'a str,
) -> BoxFuture<'a, StorageResult<()>> {
    async move {
        let children = list_directory(client, dir_uri).await?;
        try_join_all(children.into_iter().map(|child| purge(client, child))).await?;

        // list_directory already rejected non-directory URIs
        let parsed = uri::parse(dir_uri)?;
        delete_key(client, &parsed.bucket, &parsed.full_path).await
    }
    .boxed()
}

async fn purge(client: &dyn ObjectStorageClient, child_uri: String) -> StorageResult<()> {
    let parsed = uri::parse(&child_uri)?;
    if parsed.is_directory() {
        remove_tree(client, &child_uri).await
    } else {
        delete_key(client, &parsed.bucket, &parsed.full_path).await
    }
}

async fn delete_key(client: &dyn ObjectStorageClient, bucket: &str, key: &str) -> StorageResult<()> {
    client.delete_object(bucket, key).await.map_err(|e| {
        tracing::error!(error = %e, bucket = %bucket, key = %key, "S3 delete failed");
        client_error("DeleteObject", bucket, key, e)
    })?;
    tracing::debug!(bucket = %bucket, key = %key, "S3 delete successful");
    Ok(())
}

/// First path segment of `item` below `prefix`, if any.
fn child_name<'a>(prefix: &str, item: &'a str) -> Option<&'a str> {
    let rest = item.strip_prefix(prefix).unwrap_or(item);
    rest.split(SEPARATOR).next().filter(|name| !name.is_empty())
}

fn child_uri(parent: &ParsedLocation, name: &str) -> String {
    uri::build_uri(&parent.bucket, Some(&parent.path), Some(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::memory_client::InMemoryObjectClient;
    use bytes::Bytes;

    fn client() -> InMemoryObjectClient {
        let client = InMemoryObjectClient::new();
        for key in [
            "bar/",
            "bar/baz/",
            "bar/baz/test-file0.txt",
            "bar/test-file1.txt",
            "bar/with space/",
        ] {
            client.insert("foobucket", key, Bytes::new()).unwrap();
        }
        client
    }

    #[test]
    fn extracts_first_segment() {
        assert_eq!(child_name("bar/", "bar/baz/"), Some("baz"));
        assert_eq!(child_name("bar/", "bar/baz/deeper/x.txt"), Some("baz"));
        assert_eq!(child_name("bar/", "bar/"), None);
        assert_eq!(child_name("", "top.txt"), Some("top.txt"));
    }

    #[tokio::test]
    async fn lists_immediate_children() {
        let children = list_directory(&client(), "s3://foobucket/bar").await.unwrap();
        assert_eq!(
            children,
            vec![
                "s3://foobucket/bar/baz/",
                "s3://foobucket/bar/with+space/",
                "s3://foobucket/bar/test-file1.txt",
            ]
        );
    }

    #[tokio::test]
    async fn refuses_file_uris() {
        let err = list_directory(&client(), "s3://foobucket/bar/file.csv")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message().contains("Cannot list files with a non-directory url"));
    }

    #[tokio::test]
    async fn truncated_pages_fail() {
        let client = client().with_page_size(1);
        let err = list_directory(&client, "s3://foobucket/bar/").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ListingTruncated);
    }

    #[tokio::test]
    async fn removes_the_whole_tree() {
        let client = client();
        client.insert("foobucket", "keep/me.txt", Bytes::new()).unwrap();

        remove_tree(&client, "s3://foobucket/bar/").await.unwrap();

        assert_eq!(client.keys("foobucket"), vec!["keep/me.txt"]);
    }

    #[tokio::test]
    async fn lists_keys_with_url_delimiters() {
        let client = client();
        client.insert("foobucket", "bar/a#b.txt", Bytes::new()).unwrap();
        client.insert("foobucket", "bar/why?/x.txt", Bytes::new()).unwrap();

        let children = list_directory(&client, "s3://foobucket/bar/").await.unwrap();
        assert!(children.contains(&"s3://foobucket/bar/a%23b.txt".to_string()));
        assert!(children.contains(&"s3://foobucket/bar/why%3F/".to_string()));

        let parsed = uri::parse("s3://foobucket/bar/a%23b.txt").unwrap();
        assert_eq!(parsed.full_path, "bar/a#b.txt");
    }

    #[tokio::test]
    async fn removes_keys_with_url_delimiters() {
        let client = client();
        client.insert("foobucket", "bar/a#b.txt", Bytes::new()).unwrap();
        client.insert("foobucket", "bar/why?/x.txt", Bytes::new()).unwrap();
        client.insert("foobucket", "keep/me.txt", Bytes::new()).unwrap();

        remove_tree(&client, "s3://foobucket/bar/").await.unwrap();

        assert_eq!(client.keys("foobucket"), vec!["keep/me.txt"]);
    }
}
