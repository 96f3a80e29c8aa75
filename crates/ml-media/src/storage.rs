//! Storage Abstraction
//!
//! Provides a unified interface for the disks media is written to.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ml_core::config::MediaSettings;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Permissions applied to owner directories
pub const DIRECTORY_PERMISSIONS: u32 = 0o775;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage trait - one implementation per disk
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store data with a key, replacing any previous content
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Retrieve data by key
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete data by key
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if a file or directory exists at key
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Create a directory
    async fn make_directory(&self, key: &str, permissions: u32, recursive: bool)
        -> StorageResult<()>;

    /// Location of key inside the backend, for diagnostics
    fn resolve_path(&self, key: &str) -> StorageResult<String>;

    /// Get storage name for logging
    fn name(&self) -> &str;
}

/// Reject keys that could escape the disk root
fn validate_key(key: &str) -> StorageResult<&str> {
    let trimmed = key.trim_start_matches('/');
    if trimmed.split(['/', '\\']).any(|segment| segment == "..") || trimmed.starts_with('\\') {
        return Err(StorageError::InvalidPath(key.to_string()));
    }
    Ok(trimmed.trim_end_matches('/'))
}

/// Local filesystem storage
pub struct LocalStorage {
    /// Root directory of the disk
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a full path
    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn apply_permissions(path: &Path, permissions: u32) -> StorageResult<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(permissions)).await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn apply_permissions(_path: &Path, _permissions: u32) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[instrument(skip(self, data), fields(storage = "local", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.path_for(key)?;
        self.ensure_parent(&path).await?;

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        debug!(path = ?path, "File stored");
        Ok(())
    }

    #[instrument(skip(self), fields(storage = "local"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.path_for(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(storage = "local"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;

        if fs::try_exists(&path).await? {
            fs::remove_file(&path).await?;
            debug!(path = ?path, "File deleted");
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    #[instrument(skip(self), fields(storage = "local"))]
    async fn make_directory(
        &self,
        key: &str,
        permissions: u32,
        recursive: bool,
    ) -> StorageResult<()> {
        let path = self.path_for(key)?;

        if recursive {
            fs::create_dir_all(&path).await?;
        } else {
            match fs::create_dir(&path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(StorageError::NotFound(key.to_string()));
                }
                Err(e) if e.kind() != std::io::ErrorKind::AlreadyExists => return Err(e.into()),
                _ => {}
            }
        }
        Self::apply_permissions(&path, permissions).await?;

        debug!(path = ?path, "Directory ready");
        Ok(())
    }

    fn resolve_path(&self, key: &str) -> StorageResult<String> {
        Ok(self.path_for(key)?.display().to_string())
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[derive(Default)]
struct MemoryDisk {
    files: HashMap<String, Bytes>,
    directories: HashSet<String>,
}

/// In-memory storage for testing
pub struct MemoryStorage {
    inner: RwLock<MemoryDisk>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryDisk::default()),
        }
    }

    /// Keys of all stored files, sorted
    pub async fn keys(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut keys: Vec<String> = inner.files.keys().cloned().collect();
        keys.sort();
        keys
    }
}

fn parent_key(key: &str) -> Option<&str> {
    key.rsplit_once('/').map(|(parent, _)| parent)
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let key = validate_key(key)?;
        let mut inner = self.inner.write().await;
        inner.files.insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let key = validate_key(key)?;
        let inner = self.inner.read().await;
        inner
            .files
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let key = validate_key(key)?;
        let mut inner = self.inner.write().await;
        inner.files.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let key = validate_key(key)?;
        let inner = self.inner.read().await;
        Ok(inner.files.contains_key(key) || inner.directories.contains(key))
    }

    async fn make_directory(
        &self,
        key: &str,
        _permissions: u32,
        recursive: bool,
    ) -> StorageResult<()> {
        let key = validate_key(key)?;
        let mut inner = self.inner.write().await;

        if !recursive {
            if let Some(parent) = parent_key(key) {
                if !inner.directories.contains(parent) {
                    return Err(StorageError::NotFound(parent.to_string()));
                }
            }
        }

        let mut current = Some(key);
        while let Some(dir) = current {
            inner.directories.insert(dir.to_string());
            current = parent_key(dir);
        }
        Ok(())
    }

    fn resolve_path(&self, key: &str) -> StorageResult<String> {
        Ok(format!("memory://{}", validate_key(key)?))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Named disks media can be written to
#[derive(Clone, Default)]
pub struct Disks {
    disks: HashMap<String, Arc<dyn Storage>>,
}

impl Disks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a disk under a name
    pub fn with_disk(mut self, name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.disks.insert(name.into(), storage);
        self
    }

    /// One local disk per configured disk name, rooted under the storage root
    pub fn local(settings: &MediaSettings) -> Self {
        settings
            .disk_names()
            .into_iter()
            .fold(Self::new(), |disks, name| {
                let root = settings.disk_root(&name);
                disks.with_disk(name, Arc::new(LocalStorage::new(root)))
            })
    }

    pub fn disk(&self, name: &str) -> Option<Arc<dyn Storage>> {
        self.disks.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.disks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for Disks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disks").field("disks", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_core::config::AppConfig;

    #[tokio::test]
    async fn test_memory_storage_put_get() {
        let storage = MemoryStorage::new();
        let data = Bytes::from("Hello, World!");

        storage.put("1/test.txt", data.clone()).await.unwrap();

        let retrieved = storage.get("1/test.txt").await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_memory_storage_delete() {
        let storage = MemoryStorage::new();

        storage.put("test.txt", Bytes::from("test data")).await.unwrap();
        assert!(storage.exists("test.txt").await.unwrap());

        storage.delete("test.txt").await.unwrap();
        assert!(!storage.exists("test.txt").await.unwrap());

        // Deleting a missing key is not an error
        storage.delete("test.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_storage_directories() {
        let storage = MemoryStorage::new();

        let result = storage.make_directory("a/b", DIRECTORY_PERMISSIONS, false).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));

        storage.make_directory("/a/b/", DIRECTORY_PERMISSIONS, true).await.unwrap();
        assert!(storage.exists("a").await.unwrap());
        assert!(storage.exists("a/b").await.unwrap());
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_storage_not_found() {
        let storage = MemoryStorage::new();

        let result = storage.get("nonexistent.txt").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.make_directory("/42", DIRECTORY_PERMISSIONS, true).await.unwrap();
        assert!(storage.exists("42").await.unwrap());

        storage.put("42/photo.jpg", Bytes::from_static(b"jpeg")).await.unwrap();
        assert!(dir.path().join("42/photo.jpg").is_file());
        assert_eq!(
            storage.get("42/photo.jpg").await.unwrap(),
            Bytes::from_static(b"jpeg")
        );

        storage.delete("42/photo.jpg").await.unwrap();
        assert!(!storage.exists("42/photo.jpg").await.unwrap());
        storage.delete("42/photo.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_make_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage.make_directory("7", DIRECTORY_PERMISSIONS, false).await.unwrap();
        storage.make_directory("7", DIRECTORY_PERMISSIONS, false).await.unwrap();
        storage.make_directory("7", DIRECTORY_PERMISSIONS, true).await.unwrap();

        assert!(dir.path().join("7").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_directory_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.make_directory("9", DIRECTORY_PERMISSIONS, true).await.unwrap();

        let mode = std::fs::metadata(dir.path().join("9")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, DIRECTORY_PERMISSIONS);
    }

    #[tokio::test]
    async fn test_local_storage_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let result = storage.get("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));

        let result = storage.put("1/../../escape.txt", Bytes::new()).await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[test]
    fn test_local_disks_from_settings() {
        let mut config = AppConfig::default();
        config.media.disks = vec!["archive".into()];

        let disks = Disks::local(&config.media);
        assert_eq!(disks.names(), vec!["archive", "public"]);
        assert!(disks.disk("public").is_some());
        assert!(disks.disk("s3").is_none());

        let public = disks.disk("public").unwrap();
        assert_eq!(public.name(), "local");
        assert!(public
            .resolve_path("1/a.txt")
            .unwrap()
            .ends_with("app/public/1/a.txt"));
    }
}
