//! File-system seam used by file-backed stores.
//!
//! Stores only ever need three things from the medium: an existence check, a
//! whole-file read and an atomic whole-file replace. `TokioFileSystem` talks to
//! the real disk, `MemoryFileSystem` keeps files in a shared map and can be told
//! to fail writes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs;

#[async_trait]
pub trait FileSystem: Send + Sync + 'static {
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replaces the file at `path` with `bytes`, creating missing parent
    /// directories. Readers observe either the old or the new content, never a
    /// partial write.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct TokioFileSystem {
    fsync: bool,
}

impl TokioFileSystem {
    pub fn new() -> Self {
        Self { fsync: true }
    }

    /// Skips `fsync` of the temp file before it is renamed into place.
    pub fn without_fsync() -> Self {
        Self { fsync: false }
    }

    pub fn with_fsync(fsync: bool) -> Self {
        Self { fsync }
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).await?;

        let target = path.to_path_buf();
        let bytes = bytes.to_vec();
        let fsync = self.fsync;
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            // Same directory as the target so the rename never crosses devices.
            let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
            tmp.write_all(&bytes)?;
            tmp.flush()?;
            if fsync {
                tmp.as_file().sync_all()?;
            }
            tmp.persist(&target).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// In-process file system. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `write_atomic` fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Puts raw bytes at `path`, bypassing any store.
    pub fn put(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.lock().insert(path.into(), bytes.into());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().get(path.as_ref()).cloned()
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().remove(path.as_ref())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.lock().contains_key(path))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.lock().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file '{}'", path.display()),
            )
        })
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other(format!(
                "write to '{}' rejected",
                path.display()
            )));
        }
        self.lock().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn atomic_write_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/deeper/items.json");
        let fs = TokioFileSystem::new();

        assert!(!fs.exists(&path).await.unwrap());
        fs.write_atomic(&path, b"[]").await.unwrap();
        assert!(fs.exists(&path).await.unwrap());
        assert_eq!(fs.read(&path).await.unwrap(), b"[]");
    }

    #[tokio::test]
    async fn atomic_write_replaces_content_without_leftovers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("items.json");
        let fs = TokioFileSystem::without_fsync();

        fs.write_atomic(&path, b"[1,2,3,4,5,6]").await.unwrap();
        fs.write_atomic(&path, b"[7]").await.unwrap();
        assert_eq!(fs.read(&path).await.unwrap(), b"[7]");

        let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1, "temp files must be renamed away");
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let fs = TokioFileSystem::new();

        assert!(
            fs.write_atomic(&blocker.join("items.json"), b"[]")
                .await
                .is_err()
        );
        assert_eq!(std::fs::read(&blocker).unwrap(), b"file, not a directory");
    }

    #[tokio::test]
    async fn memory_fs_shares_files_between_clones() {
        let fs = MemoryFileSystem::new();
        let other = fs.clone();
        fs.write_atomic(Path::new("/a.json"), b"[]").await.unwrap();
        assert_eq!(other.get("/a.json").unwrap(), b"[]");

        other.set_fail_writes(true);
        assert!(fs.write_atomic(Path::new("/a.json"), b"[1]").await.is_err());
        assert_eq!(fs.get("/a.json").unwrap(), b"[]");

        let err = fs.read(Path::new("/missing.json")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
