//! In-memory filesystem backend
//!
//! A virtual tree that exists only for the lifetime of the value. Paths are
//! resolved against a working directory, so relative and absolute references
//! both work. Behaves like the local backend: writes need an existing parent
//! directory, and missing entries fail the way a real filesystem would.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tinyfs_core::constants::{SEPARATOR, SEPARATOR_STR};
use tinyfs_core::{FileType, Reference};

use crate::path_utils;
use crate::stream;
use crate::traits::{
    AppendableFileSystem, ByteStream, FileWriter, GlobFileSystem, StorageError, StorageResult,
    TinyFileSystem,
};

const ID: &str = "MemFsTinyFileSystem";

#[derive(Clone, Debug)]
enum Entry {
    File(Vec<u8>),
    Directory,
}

type Entries = BTreeMap<String, Entry>;

/// In-memory implementation of [`TinyFileSystem`]
///
/// Clones share the same tree.
#[derive(Clone)]
pub struct MemoryFileSystem {
    entries: Arc<RwLock<Entries>>,
    cwd: String,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new(SEPARATOR_STR)
    }
}

impl MemoryFileSystem {
    /// Empty tree with the given working directory (created if missing)
    pub fn new(cwd: &str) -> Self {
        let cwd = path_utils::normalize(&format!("{}{}", SEPARATOR, cwd));
        let cwd = trim_dir(&cwd).to_string();

        let mut entries = Entries::new();
        insert_parents(&mut entries, &cwd);
        entries.insert(cwd.clone(), Entry::Directory);

        MemoryFileSystem {
            entries: Arc::new(RwLock::new(entries)),
            cwd,
        }
    }

    /// Seed the tree from `(path, contents)` pairs
    ///
    /// Relative paths are resolved against `cwd`; parent directories are
    /// created as needed.
    pub fn from_files<I, P, C>(files: I, cwd: &str) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        let fs = Self::new(cwd);
        if let Ok(mut entries) = fs.entries.write() {
            for (path, contents) in files {
                let path = fs.resolve(path.as_ref());
                insert_parents(&mut entries, &path);
                entries.insert(path, Entry::File(contents.into()));
            }
        }
        fs
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Absolute, normalized key for a path
    fn resolve(&self, path: &str) -> String {
        let absolute = if path_utils::is_absolute(path) {
            path_utils::normalize(path)
        } else {
            path_utils::join(&[&self.cwd, path])
        };
        trim_dir(&absolute).to_string()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Entries>> {
        self.entries
            .read()
            .map_err(|_| StorageError::backend("Lock poisoned"))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Entries>> {
        self.entries
            .write()
            .map_err(|_| StorageError::backend("Lock poisoned"))
    }

    fn open_writer(&self, file_path: &str, append: bool) -> StorageResult<Box<dyn FileWriter>> {
        let key = self.resolve(file_path);
        {
            let mut entries = self.write()?;
            check_parent(&entries, &key, "open")?;
            match entries.get(&key) {
                Some(Entry::Directory) => return Err(is_a_directory("open", file_path)),
                Some(Entry::File(_)) if append => {}
                _ => {
                    entries.insert(key.clone(), Entry::File(Vec::new()));
                }
            }
        }

        Ok(Box::new(MemoryFileWriter {
            entries: self.entries.clone(),
            key,
            written: 0,
            closed: false,
        }))
    }
}

/// Strip a trailing separator unless the path is the root
fn trim_dir(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches(SEPARATOR)
    } else {
        path
    }
}

fn parent_of(key: &str) -> String {
    path_utils::dirname(key)
}

fn insert_parents(entries: &mut Entries, key: &str) {
    let mut current = String::new();
    entries.insert(SEPARATOR_STR.to_string(), Entry::Directory);
    let segments: Vec<&str> = key.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
    for segment in &segments[..segments.len().saturating_sub(1)] {
        current.push(SEPARATOR);
        current.push_str(segment);
        entries.entry(current.clone()).or_insert(Entry::Directory);
    }
}

fn not_found(op: &str, path: &str) -> StorageError {
    StorageError::backend(format!(
        "ENOENT: no such file or directory, {} '{}'",
        op, path
    ))
}

fn is_a_directory(op: &str, path: &str) -> StorageError {
    StorageError::backend(format!(
        "EISDIR: illegal operation on a directory, {} '{}'",
        op, path
    ))
}

fn not_a_directory(op: &str, path: &str) -> StorageError {
    StorageError::backend(format!("ENOTDIR: not a directory, {} '{}'", op, path))
}

fn check_parent(entries: &Entries, key: &str, op: &str) -> StorageResult<()> {
    let parent = parent_of(key);
    match entries.get(&parent) {
        Some(Entry::Directory) => Ok(()),
        Some(Entry::File(_)) => Err(not_a_directory(op, key)),
        None => Err(not_found(op, key)),
    }
}

/// Keys strictly below a directory key
fn descendants<'a>(entries: &'a Entries, dir: &str) -> impl Iterator<Item = (&'a String, &'a Entry)> {
    let prefix = if dir == SEPARATOR_STR {
        dir.to_string()
    } else {
        format!("{}{}", dir, SEPARATOR)
    };
    entries
        .range(prefix.clone()..)
        .take_while(move |(key, _)| key.starts_with(&prefix))
}

#[async_trait]
impl TinyFileSystem for MemoryFileSystem {
    fn id(&self) -> &'static str {
        ID
    }

    async fn list_files(&self, dir_path: &str) -> StorageResult<Vec<Reference>> {
        let dir = self.resolve(dir_path);
        let entries = self.read()?;
        match entries.get(&dir) {
            Some(Entry::Directory) => {}
            Some(Entry::File(_)) => return Err(not_a_directory("scandir", dir_path)),
            None => return Err(not_found("scandir", dir_path)),
        }

        let prefix_len = if dir == SEPARATOR_STR { 1 } else { dir.len() + 1 };
        let children = descendants(&entries, &dir)
            .map(|(key, _)| &key[prefix_len..])
            .filter(|name| !name.is_empty() && !name.contains(SEPARATOR))
            .map(|name| Reference::Path(path_utils::join(&[dir_path, name])))
            .collect();
        Ok(children)
    }

    async fn get_file_type(&self, path: &str) -> StorageResult<FileType> {
        let key = self.resolve(path);
        match self.read()?.get(&key) {
            Some(Entry::File(_)) => Ok(FileType::File),
            Some(Entry::Directory) => Ok(FileType::Directory),
            None => Err(not_found("lstat", path)),
        }
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let key = self.resolve(path);
        Ok(self.read()?.contains_key(&key))
    }

    async fn read_file(&self, file_path: &str) -> StorageResult<Bytes> {
        let key = self.resolve(file_path);
        match self.read()?.get(&key) {
            Some(Entry::File(data)) => Ok(Bytes::copy_from_slice(data)),
            Some(Entry::Directory) => Err(is_a_directory("read", file_path)),
            None => Err(not_found("open", file_path)),
        }
    }

    async fn write_file(&self, file_path: &str, data: Bytes) -> StorageResult<()> {
        let key = self.resolve(file_path);
        let mut entries = self.write()?;
        check_parent(&entries, &key, "open")?;
        if let Some(Entry::Directory) = entries.get(&key) {
            return Err(is_a_directory("open", file_path));
        }

        tracing::debug!(path = %key, size_bytes = data.len(), "Memory storage write successful");
        entries.insert(key, Entry::File(data.to_vec()));
        Ok(())
    }

    async fn delete_file(&self, file_path: &str) -> StorageResult<()> {
        let key = self.resolve(file_path);
        let mut entries = self.write()?;
        match entries.get(&key) {
            Some(Entry::File(_)) => {
                entries.remove(&key);
                Ok(())
            }
            Some(Entry::Directory) => Err(is_a_directory("unlink", file_path)),
            None => Err(not_found("unlink", file_path)),
        }
    }

    async fn create_directory(&self, dir_path: &str) -> StorageResult<()> {
        let key = self.resolve(dir_path);
        let mut entries = self.write()?;

        let mut current = String::new();
        for segment in key.split(SEPARATOR).filter(|s| !s.is_empty()) {
            current.push(SEPARATOR);
            current.push_str(segment);
            match entries.get(&current) {
                Some(Entry::Directory) => {}
                Some(Entry::File(_)) => return Err(not_a_directory("mkdir", dir_path)),
                None => {
                    entries.insert(current.clone(), Entry::Directory);
                }
            }
        }
        Ok(())
    }

    async fn remove_directory(&self, dir_path: &str) -> StorageResult<()> {
        let key = self.resolve(dir_path);
        let mut entries = self.write()?;
        match entries.get(&key) {
            None => return Ok(()),
            Some(Entry::File(_)) => return Err(not_a_directory("rm", dir_path)),
            Some(Entry::Directory) => {}
        }

        let doomed: Vec<String> = descendants(&entries, &key)
            .map(|(k, _)| k.clone())
            .collect();
        for k in &doomed {
            entries.remove(k);
        }
        if key != SEPARATOR_STR {
            entries.remove(&key);
        }

        tracing::debug!(path = %key, removed = doomed.len(), "Memory storage directory removed");
        Ok(())
    }

    async fn file_read_stream(&self, file_path: &str) -> StorageResult<ByteStream> {
        let data = self.read_file(file_path).await?;
        Ok(stream::once(data))
    }

    async fn file_write_stream(&self, file_path: &str) -> StorageResult<Box<dyn FileWriter>> {
        self.open_writer(file_path, false)
    }

    async fn dir_name(&self, file_path: &str) -> StorageResult<Reference> {
        Ok(Reference::Path(path_utils::dirname(file_path)))
    }

    async fn file_name(&self, file_path: &str) -> StorageResult<String> {
        if !self.get_file_type(file_path).await?.is_file() {
            return Err(StorageError::type_mismatch(format!(
                "[{}] Cannot get fileName of a directory: {}",
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
impl AppendableFileSystem for MemoryFileSystem {
    async fn file_append_stream(&self, file_path: &str) -> StorageResult<Box<dyn FileWriter>> {
        self.open_writer(file_path, true)
    }
}

#[async_trait]
impl GlobFileSystem for MemoryFileSystem {
    async fn glob(&self, pattern: &str) -> StorageResult<Vec<Reference>> {
        let relative = !path_utils::is_absolute(pattern);
        let resolved = if relative {
            path_utils::join(&[&self.cwd, pattern])
        } else {
            pattern.to_string()
        };
        let matcher = glob::Pattern::new(&resolved).map_err(|e| {
            StorageError::wrap(format!("Invalid glob pattern {}: {}", pattern, e), e)
        })?;
        let options = glob::MatchOptions {
            require_literal_separator: true,
            ..Default::default()
        };

        let entries = self.read()?;
        let matches = entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::File(_)))
            .filter(|(key, _)| matcher.matches_with(key, options))
            .map(|(key, _)| {
                if relative {
                    Reference::Path(path_utils::relative(&self.cwd, key))
                } else {
                    Reference::Path(key.clone())
                }
            })
            .collect();
        Ok(matches)
    }
}

/// Writer appending straight into the shared tree
struct MemoryFileWriter {
    entries: Arc<RwLock<Entries>>,
    key: String,
    written: u64,
    closed: bool,
}

#[async_trait]
impl FileWriter for MemoryFileWriter {
    async fn write(&mut self, data: &[u8]) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::backend(format!(
                "[{}] Write after close: {}",
                ID, self.key
            )));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::backend("Lock poisoned"))?;
        match entries.get_mut(&self.key) {
            Some(Entry::File(contents)) => contents.extend_from_slice(data),
            _ => return Err(not_found("write", &self.key)),
        }
        self.written += data.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.closed = true;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

#[cfg(all(test, feature = "storage-memory"))]
mod tests {
    use super::*;
    use crate::traits::ErrorKind;
    use futures::StreamExt;

    fn seeded() -> MemoryFileSystem {
        MemoryFileSystem::from_files(
            [
                ("/tmp/foo.csv", "a,b\n1,2\n"),
                ("/tmp/bar/baz.txt", "baz"),
                ("notes/todo.md", "- one"),
            ],
            "/home",
        )
    }

    #[tokio::test]
    async fn seeds_relative_to_cwd() {
        let fs = seeded();
        assert_eq!(fs.cwd(), "/home");
        assert!(fs.exists("/home/notes/todo.md").await.unwrap());
        assert_eq!(fs.read_file("notes/todo.md").await.unwrap(), "- one");
        assert_eq!(fs.get_file_type("/home/notes").await.unwrap(), FileType::Directory);
    }

    #[tokio::test]
    async fn lists_sorted_children() {
        let fs = seeded();
        fs.write_file("/tmp/a.txt", Bytes::from_static(b"a")).await.unwrap();
        let listed = fs.list_files("/tmp").await.unwrap();
        assert_eq!(
            listed,
            vec![
                Reference::Path("/tmp/a.txt".into()),
                Reference::Path("/tmp/bar".into()),
                Reference::Path("/tmp/foo.csv".into()),
            ]
        );
    }

    #[tokio::test]
    async fn listing_a_missing_directory_fails() {
        let err = seeded().list_files("/nope").await.unwrap_err();
        assert!(err.message().contains("ENOENT"));
    }

    #[tokio::test]
    async fn write_needs_existing_parent() {
        let fs = seeded();
        let err = fs
            .write_file("/missing/x.txt", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.message().contains("ENOENT"));

        fs.create_directory("/missing/deeper").await.unwrap();
        fs.write_file("/missing/deeper/x.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(fs.exists("/missing/deeper/x.txt").await.unwrap());
    }

    #[tokio::test]
    async fn remove_directory_is_recursive_and_idempotent() {
        let fs = seeded();
        fs.remove_directory("/tmp").await.unwrap();
        assert!(!fs.exists("/tmp/bar/baz.txt").await.unwrap());
        assert!(!fs.exists("/tmp").await.unwrap());
        fs.remove_directory("/tmp").await.unwrap();
        assert!(fs.exists("/home/notes/todo.md").await.unwrap());
    }

    #[tokio::test]
    async fn delete_file_rejects_directories() {
        let fs = seeded();
        assert!(fs.delete_file("/tmp/bar").await.is_err());
        fs.delete_file("/tmp/foo.csv").await.unwrap();
        assert!(fs.delete_file("/tmp/foo.csv").await.is_err());
    }

    #[tokio::test]
    async fn write_and_append_streams() {
        let fs = seeded();
        let mut writer = fs.file_write_stream("/tmp/log.txt").await.unwrap();
        writer.write(b"first\n").await.unwrap();
        writer.close().await.unwrap();
        assert!(writer.write(b"late").await.is_err());

        let mut writer = fs.file_append_stream("/tmp/log.txt").await.unwrap();
        writer.write(b"second\n").await.unwrap();
        writer.close().await.unwrap();
        assert_eq!(writer.bytes_written(), 7);

        let lines: Vec<String> = fs
            .file_line_stream("/tmp/log.txt")
            .await
            .unwrap()
            .map(|line| line.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn file_name_requires_a_file() {
        let fs = seeded();
        assert_eq!(fs.file_name("/tmp/foo.csv").await.unwrap(), "foo.csv");
        let err = fs.file_name("/tmp/bar").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(
            fs.dir_name("/tmp/bar/baz.txt").await.unwrap(),
            Reference::Path("/tmp/bar".into())
        );
    }

    #[tokio::test]
    async fn glob_matches_files() {
        let fs = seeded();
        assert_eq!(
            fs.glob("/tmp/*.csv").await.unwrap(),
            vec![Reference::Path("/tmp/foo.csv".into())]
        );
        assert_eq!(
            fs.glob("/tmp/**/*.txt").await.unwrap(),
            vec![Reference::Path("/tmp/bar/baz.txt".into())]
        );
        assert_eq!(
            fs.glob("notes/*.md").await.unwrap(),
            vec![Reference::Path("notes/todo.md".into())]
        );
    }
}
