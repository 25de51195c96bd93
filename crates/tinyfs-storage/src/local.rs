use crate::path_utils;
use crate::traits::{
    AppendableFileSystem, ByteStream, FileWriter, GlobFileSystem, StorageError, StorageResult,
    TinyFileSystem,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use std::io::ErrorKind as IoErrorKind;
use std::time::Instant;
use tinyfs_core::{FileType, Reference};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

const ID: &str = "NodeTinyFileSystem";

/// Local filesystem implementation of [`TinyFileSystem`]
///
/// A thin pass-through to `tokio::fs`; references are plain paths.
#[derive(Clone, Debug, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        LocalFileSystem
    }

    async fn open_writer(&self, file_path: &str, append: bool) -> StorageResult<Box<dyn FileWriter>> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(file_path)
            .await
            .map_err(|e| io_error("open file for writing", file_path, e))?;

        Ok(Box::new(LocalFileWriter {
            path: file_path.to_string(),
            file: Some(file),
            written: 0,
        }))
    }
}

fn io_error(action: &str, path: &str, err: std::io::Error) -> StorageError {
    tracing::error!(error = %err, path = %path, "Local storage failed to {}", action);
    StorageError::wrap(format!("Failed to {} {}: {}", action, path, err), err)
}

#[async_trait]
impl TinyFileSystem for LocalFileSystem {
    fn id(&self) -> &'static str {
        ID
    }

    async fn list_files(&self, dir_path: &str) -> StorageResult<Vec<Reference>> {
        let mut entries = fs::read_dir(dir_path)
            .await
            .map_err(|e| io_error("list directory", dir_path, e))?;

        let mut children = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list directory", dir_path, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            children.push(Reference::Path(path_utils::join(&[dir_path, &name])));
        }
        children.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(children)
    }

    async fn get_file_type(&self, path: &str) -> StorageResult<FileType> {
        let metadata = fs::symlink_metadata(path)
            .await
            .map_err(|e| io_error("stat", path, e))?;

        let file_type = metadata.file_type();
        Ok(if file_type.is_file() {
            FileType::File
        } else if file_type.is_dir() {
            FileType::Directory
        } else {
            FileType::Other
        })
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        match fs::symlink_metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("stat", path, e)),
        }
    }

    async fn read_file(&self, file_path: &str) -> StorageResult<Bytes> {
        let start = Instant::now();
        let data = fs::read(file_path)
            .await
            .map_err(|e| io_error("read file", file_path, e))?;

        tracing::debug!(
            path = %file_path,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage read successful"
        );
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, file_path: &str, data: Bytes) -> StorageResult<()> {
        let start = Instant::now();
        let size = data.len();
        fs::write(file_path, &data)
            .await
            .map_err(|e| io_error("write file", file_path, e))?;

        tracing::debug!(
            path = %file_path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );
        Ok(())
    }

    async fn delete_file(&self, file_path: &str) -> StorageResult<()> {
        fs::remove_file(file_path)
            .await
            .map_err(|e| io_error("delete file", file_path, e))?;
        tracing::debug!(path = %file_path, "Local storage delete successful");
        Ok(())
    }

    async fn create_directory(&self, dir_path: &str) -> StorageResult<()> {
        if self.exists(dir_path).await? {
            return Ok(());
        }
        fs::create_dir_all(dir_path)
            .await
            .map_err(|e| io_error("create directory", dir_path, e))
    }

    async fn remove_directory(&self, dir_path: &str) -> StorageResult<()> {
        if !self.exists(dir_path).await? {
            return Ok(());
        }
        fs::remove_dir_all(dir_path)
            .await
            .map_err(|e| io_error("remove directory", dir_path, e))?;
        tracing::debug!(path = %dir_path, "Local storage directory removed");
        Ok(())
    }

    async fn file_read_stream(&self, file_path: &str) -> StorageResult<ByteStream> {
        let file = fs::File::open(file_path)
            .await
            .map_err(|e| io_error("open file", file_path, e))?;
        Ok(Box::pin(ReaderStream::new(file).map_err(StorageError::from)))
    }

    async fn file_write_stream(&self, file_path: &str) -> StorageResult<Box<dyn FileWriter>> {
        self.open_writer(file_path, false).await
    }

    async fn dir_name(&self, file_path: &str) -> StorageResult<Reference> {
        self.get_file_type(file_path).await?;
        Ok(Reference::Path(path_utils::dirname(file_path)))
    }

    async fn file_name(&self, file_path: &str) -> StorageResult<String> {
        if !self.get_file_type(file_path).await?.is_file() {
            return Err(StorageError::type_mismatch(format!(
                "[{}] Cannot get the file name of a non-file path: {}",
                ID, file_path
            )));
        }
        Ok(path_utils::basename(file_path, None))
    }

    fn basename(&self, path: &str, suffix: Option<&str>) -> String {
        path_utils::basename(path, suffix)
    }

    fn join_path(&self, parts: &[&str]) -> StorageResult<Reference> {
        Ok(Reference::Path(path_utils::join(parts)))
    }

    fn relative(&self, from: &str, to: &str) -> String {
        path_utils::relative(from, to)
    }

    fn extname(&self, path: &str) -> String {
        path_utils::extname(path)
    }

    fn is_absolute(&self, path: &str) -> bool {
        path_utils::is_absolute(path)
    }
}

#[async_trait]
impl AppendableFileSystem for LocalFileSystem {
    async fn file_append_stream(&self, file_path: &str) -> StorageResult<Box<dyn FileWriter>> {
        self.open_writer(file_path, true).await
    }
}

#[async_trait]
impl GlobFileSystem for LocalFileSystem {
    async fn glob(&self, pattern: &str) -> StorageResult<Vec<Reference>> {
        let pattern = pattern.to_string();
        let matches = tokio::task::spawn_blocking(move || -> StorageResult<Vec<Reference>> {
            let paths = glob::glob(&pattern).map_err(|e| {
                StorageError::wrap(format!("Invalid glob pattern {}: {}", pattern, e), e)
            })?;

            let mut matches = Vec::new();
            for entry in paths {
                let path = entry.map_err(|e| {
                    StorageError::wrap(format!("Failed to read glob match: {}", e), e)
                })?;
                if path.is_file() {
                    matches.push(Reference::Path(path.to_string_lossy().into_owned()));
                }
            }
            Ok(matches)
        })
        .await
        .map_err(|e| StorageError::wrap(format!("Glob task failed: {}", e), e))??;

        Ok(matches)
    }
}

/// Writer over an open file; `close` flushes and syncs it
struct LocalFileWriter {
    path: String,
    file: Option<fs::File>,
    written: u64,
}

#[async_trait]
impl FileWriter for LocalFileWriter {
    async fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            StorageError::backend(format!("[{}] Write after close: {}", ID, self.path))
        })?;
        file.write_all(data)
            .await
            .map_err(|e| io_error("write file", &self.path, e))?;
        self.written += data.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> StorageResult<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        file.flush()
            .await
            .map_err(|e| io_error("flush file", &self.path, e))?;
        file.sync_all()
            .await
            .map_err(|e| io_error("sync file", &self.path, e))?;

        tracing::debug!(
            path = %self.path,
            size_bytes = self.written,
            "Local storage stream write successful"
        );
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::tempdir;

    fn p(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let file = p(&dir, "a.txt");

        fs.write_file(&file, Bytes::from_static(b"hello")).await.unwrap();
        assert!(fs.exists(&file).await.unwrap());
        assert_eq!(fs.read_file(&file).await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(fs.get_file_type(&file).await.unwrap(), FileType::File);

        fs.delete_file(&file).await.unwrap();
        assert!(!fs.exists(&file).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_nonexistent_fails() {
        let dir = tempdir().unwrap();
        let err = LocalFileSystem::new()
            .delete_file(&p(&dir, "missing.txt"))
            .await
            .unwrap_err();
        assert!(err.message().contains("missing.txt"));
    }

    #[tokio::test]
    async fn test_list_files_joins_names() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let root = dir.path().to_string_lossy().into_owned();
        fs.write_file(&p(&dir, "b.txt"), Bytes::new()).await.unwrap();
        fs.create_directory(&p(&dir, "a")).await.unwrap();

        let listed = fs.list_files(&root).await.unwrap();
        assert_eq!(
            listed,
            vec![Reference::Path(p(&dir, "a")), Reference::Path(p(&dir, "b.txt"))]
        );
    }

    #[tokio::test]
    async fn test_directory_create_and_remove_are_idempotent() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let nested = p(&dir, "x/y/z");

        fs.create_directory(&nested).await.unwrap();
        fs.create_directory(&nested).await.unwrap();
        assert_eq!(fs.get_file_type(&nested).await.unwrap(), FileType::Directory);

        fs.write_file(&p(&dir, "x/y/z/f.txt"), Bytes::from_static(b"1")).await.unwrap();
        fs.remove_directory(&p(&dir, "x")).await.unwrap();
        fs.remove_directory(&p(&dir, "x")).await.unwrap();
        assert!(!fs.exists(&p(&dir, "x")).await.unwrap());
    }

    #[tokio::test]
    async fn test_stream_write_then_append() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let file = p(&dir, "log.txt");

        let mut writer = fs.file_write_stream(&file).await.unwrap();
        writer.write(b"one\n").await.unwrap();
        writer.close().await.unwrap();
        assert_eq!(writer.bytes_written(), 4);

        let mut writer = fs.file_append_stream(&file).await.unwrap();
        writer.write(b"two\r\n").await.unwrap();
        writer.close().await.unwrap();

        let lines: Vec<String> = fs
            .file_line_stream(&file)
            .await
            .unwrap()
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_read_stream_yields_content() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let file = p(&dir, "data.bin");
        fs.write_file(&file, Bytes::from(vec![7u8; 20_000])).await.unwrap();

        let stream = fs.file_read_stream(&file).await.unwrap();
        let data = crate::stream::read_stream_to_bytes(stream).await.unwrap();
        assert_eq!(data.len(), 20_000);
    }

    #[tokio::test]
    async fn test_dir_name_and_file_name_stat_first() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let file = p(&dir, "doc.md");
        let root = dir.path().to_string_lossy().into_owned();

        assert!(fs.dir_name(&file).await.is_err());

        fs.write_file(&file, Bytes::new()).await.unwrap();
        assert_eq!(fs.dir_name(&file).await.unwrap(), Reference::Path(root.clone()));
        assert_eq!(fs.file_name(&file).await.unwrap(), "doc.md");

        let err = fs.file_name(&root).await.unwrap_err();
        assert_eq!(err.kind(), crate::traits::ErrorKind::TypeMismatch);
    }

    #[tokio::test]
    async fn test_glob_matches_files_only() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        fs.write_file(&p(&dir, "a.csv"), Bytes::new()).await.unwrap();
        fs.write_file(&p(&dir, "b.csv"), Bytes::new()).await.unwrap();
        fs.write_file(&p(&dir, "c.txt"), Bytes::new()).await.unwrap();
        fs.create_directory(&p(&dir, "d.csv")).await.unwrap();

        let matches = fs.glob(&p(&dir, "*.csv")).await.unwrap();
        assert_eq!(
            matches,
            vec![Reference::Path(p(&dir, "a.csv")), Reference::Path(p(&dir, "b.csv"))]
        );
    }

    #[test]
    fn test_path_helpers() {
        let fs = LocalFileSystem::new();
        assert_eq!(
            fs.join_path(&["/tmp", "a", "../b.txt"]).unwrap(),
            Reference::Path("/tmp/b.txt".to_string())
        );
        assert_eq!(fs.extname("/tmp/b.txt"), ".txt");
        assert!(fs.is_absolute("/tmp"));
        assert!(!fs.is_absolute("tmp"));
    }
}
