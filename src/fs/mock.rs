// src/fs/mock.rs

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;

use super::{FileStat, FileSystem};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, mtime: SystemTime },
    Dir(Vec<String>), // List of child names
}

/// In-memory filesystem for tests.
///
/// Paths are used verbatim as keys, so tests should stick to one consistent
/// (relative) spelling per file. Cloning shares the underlying tree, which
/// lets a test keep mutating files while a pipeline or poller holds the
/// same filesystem.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    writes: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Ensure root exists
        entries.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            entries: Arc::new(Mutex::new(entries)),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Insert a file, implicitly creating parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.add_file_with_mtime(path, content, SystemTime::UNIX_EPOCH);
    }

    pub fn add_file_with_mtime(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        mtime: SystemTime,
    ) {
        let path = path.as_ref().to_path_buf();
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            path.clone(),
            MockEntry::File {
                content: content.into(),
                mtime,
            },
        );
        Self::link_to_parent(&mut entries, &path);
    }

    /// Bump a file's modification time without touching its content.
    pub fn touch(&self, path: impl AsRef<Path>, mtime: SystemTime) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(MockEntry::File { mtime: m, .. }) = entries.get_mut(path.as_ref()) {
            *m = mtime;
        }
    }

    /// Remove a file and unlink it from its parent directory.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.entries.lock().unwrap();
        entries.remove(path);
        let parent = Self::parent_of(path);
        if let Some(MockEntry::Dir(children)) = entries.get_mut(&parent) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                children.retain(|c| c != name);
            }
        }
    }

    /// Paths passed to `write`, in call order.
    pub fn written(&self) -> Vec<PathBuf> {
        self.writes.lock().unwrap().clone()
    }

    fn parent_of(path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn link_to_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let parent = Self::parent_of(path);
        Self::ensure_dir_entry(entries, &parent);
        if let Some(MockEntry::Dir(children)) = entries.get_mut(&parent) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if !children.contains(&name.to_string()) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if entries.contains_key(path) {
            return;
        }
        entries.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        let parent = Self::parent_of(path);
        if parent != path {
            Self::link_to_parent(entries, path);
        }
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, format!("not found: {path:?}"))
    }
}

#[async_trait]
impl FileSystem for MockFileSystem {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            Some(MockEntry::File { .. }) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {path:?}"),
            )),
            None => Err(Self::not_found(path)),
        }
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(MockEntry::Dir(_)) => Ok(FileStat {
                is_dir: true,
                modified: SystemTime::UNIX_EPOCH,
            }),
            Some(MockEntry::File { mtime, .. }) => Ok(FileStat {
                is_dir: false,
                modified: *mtime,
            }),
            None => Err(Self::not_found(path)),
        }
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(MockEntry::File { content, .. }) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {path:?}"),
            )),
            None => Err(Self::not_found(path)),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let mut chain = vec![path.to_path_buf()];
        let mut cur = path.to_path_buf();
        while let Some(parent) = cur.parent() {
            if parent.as_os_str().is_empty() {
                break;
            }
            chain.push(parent.to_path_buf());
            cur = parent.to_path_buf();
        }
        for dir in chain.into_iter().rev() {
            Self::ensure_dir_entry(&mut entries, &dir);
        }
        Ok(())
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let parent = Self::parent_of(path);
        if !matches!(entries.get(&parent), Some(MockEntry::Dir(_))) {
            return Err(Self::not_found(&parent));
        }
        entries.insert(
            path.to_path_buf(),
            MockEntry::File {
                content: contents.to_vec(),
                mtime: SystemTime::now(),
            },
        );
        Self::link_to_parent(&mut entries, path);
        self.writes.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}
