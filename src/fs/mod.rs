// src/fs/mod.rs

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;

pub mod mock;

/// The slice of file metadata the pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub modified: SystemTime,
}

/// Abstract asynchronous filesystem interface.
///
/// Everything the walker, the file processor and the poller touch on disk
/// goes through this trait, so tests can run against [`mock::MockFileSystem`]
/// without a real filesystem. Errors are plain `io::Result` so callers can
/// distinguish a missing file (`ErrorKind::NotFound`) from a real failure.
#[async_trait]
pub trait FileSystem: Send + Sync + Debug {
    /// Return a list of entries in a directory.
    /// Returns full paths.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Stat a file or directory.
    async fn stat(&self, path: &Path) -> io::Result<FileStat>;

    /// Read a file's bytes.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create a directory and all missing parents.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write a file. The parent directory must already exist.
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// Implementation that uses `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

#[async_trait]
impl FileSystem for RealFileSystem {
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dir = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(FileStat {
            is_dir: meta.is_dir(),
            modified: meta.modified()?,
        })
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }
}
