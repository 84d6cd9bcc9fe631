//! Key-value text storage backends used to persist editor content

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use directories::ProjectDirs;

use super::error::StorageError;

/// Key holding the document body
pub const CONTENT_KEY: &str = "emr-editor-content";
/// Key holding the ISO-8601 timestamp of the last save
pub const LAST_SAVED_KEY: &str = "emr-editor-last-saved";
/// Disposable key written and removed to check the store is usable
pub const CHECK_KEY: &str = "test-storage";
const CHECK_VALUE: &str = "test";

/// A text key-value store
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value; deleting a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Write then delete a throwaway key to check the store accepts writes
    async fn check_writable(&self) -> Result<(), StorageError> {
        self.set(CHECK_KEY, CHECK_VALUE).await?;
        self.remove(CHECK_KEY).await
    }
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: BTreeMap<String, String>,
    disabled: bool,
}

/// In-process store with an optional byte quota
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
    quota: Option<usize>,
}

impl MemoryStorage {
    /// Create an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that refuses writes past `quota` bytes of keys and values
    pub fn with_quota(quota: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            quota: Some(quota),
        }
    }

    /// Make every call fail, as a browser does in some privacy modes
    pub fn set_disabled(&self, disabled: bool) {
        self.lock().disabled = disabled;
    }

    /// Bytes currently stored
    pub fn used_bytes(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // Entries stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_enabled(inner: &MemoryInner) -> Result<(), StorageError> {
        if inner.disabled {
            return Err(StorageError::Unavailable("storage is disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let inner = self.lock();
        Self::check_enabled(&inner)?;
        Ok(inner.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        Self::check_enabled(&inner)?;

        if let Some(quota) = self.quota {
            let others: usize = inner
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let needed = others + entry_size(key, value);
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }

        inner.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        Self::check_enabled(&inner)?;
        inner.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object file, written through on every change
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    cache: tokio::sync::Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStorage {
    /// Use the JSON file at `path`; it is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: tokio::sync::Mutex::new(None),
        }
    }

    /// Default location inside the platform data directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "emr-editor", "EmrEditor")
            .map(|dirs| dirs.data_dir().join("storage.json"))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sibling file a corrupt store is moved to before being replaced
    pub fn corrupt_backup_path(&self) -> PathBuf {
        self.sibling("corrupt")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{suffix}"));
        self.path.with_file_name(name)
    }

    /// Write to a temporary sibling and rename it over the store, so an
    /// interrupted write never leaves a truncated file behind
    async fn write_file(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.sibling("tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Entries to build the next write on. An unreadable store is moved
    /// aside and replaced by an empty one.
    async fn entries_for_write(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match self.read_file().await {
            Ok(entries) => Ok(entries),
            Err(StorageError::Serialization(e)) => {
                let backup = self.corrupt_backup_path();
                tracing::warn!(
                    "Storage file {} is corrupt ({}), moving it to {}",
                    self.path.display(),
                    e,
                    backup.display()
                );
                tokio::fs::rename(&self.path, &backup).await?;
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply `change` to the entries and persist them. The cache is only
    /// updated once the file write has succeeded.
    async fn mutate<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) + Send,
    {
        let mut cache = self.cache.lock().await;
        let mut entries = match cache.as_ref() {
            Some(entries) => entries.clone(),
            None => self.entries_for_write().await?,
        };
        change(&mut entries);
        self.write_file(&entries).await?;
        *cache = Some(entries);
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(cache.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.mutate(move |entries| {
            entries.insert(key, value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
        .await
    }
}
