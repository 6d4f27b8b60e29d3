//! Client-local persistence for the session record.
//!
//! The session is persisted as two string entries under fixed keys
//! ([`keys::TOKEN`] and [`keys::USER`]), the way a browser client keeps them
//! in local storage. Writes that touch both keys go through a single
//! `set_many`/`remove_many` call so that the pair changes together.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// Storage keys for the session record.
pub mod keys {
    /// Bearer token.
    pub const TOKEN: &str = "token";

    /// JSON-encoded user profile.
    pub const USER: &str = "user";
}

/// Errors from a [`SessionStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings.
    #[error("Corrupt session file {path}: {source}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value persistence for the session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read one entry.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write several entries in one operation.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError>;

    /// Remove several entries in one operation.
    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError>;
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Process-local store, for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with entries.
    #[must_use]
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let store = Self::new();
        {
            let mut map = store.lock();
            for (key, value) in entries {
                map.insert((*key).to_string(), (*value).to_string());
            }
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut map = self.lock();
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut map = self.lock();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

/// Store backed by a JSON object file.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash never leaves a half-written record. A file that does
/// not parse is treated as empty and reset to `{}` on first access.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Create a store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Read under the write lock, discarding an unparseable file.
    async fn read_for_write(&self) -> Result<HashMap<String, String>, StoreError> {
        match self.read_all().await {
            Err(StoreError::Corrupt { source, .. }) => {
                warn!(path = %self.path.display(), error = %source, "Overwriting corrupt session file");
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    /// Re-read under the write lock and reset the file if it is still corrupt.
    async fn read_or_reset(&self, first_error: &serde_json::Error) -> Result<HashMap<String, String>, StoreError> {
        match self.read_all().await {
            Err(StoreError::Corrupt { .. }) => {
                warn!(path = %self.path.display(), error = %first_error, "Resetting corrupt session file");
                let empty = HashMap::new();
                self.write_all(&empty).await?;
                Ok(empty)
            }
            other => other,
        }
    }

    async fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let bytes = serde_json::to_vec_pretty(entries).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.read_all().await {
            Ok(mut map) => Ok(map.remove(key)),
            Err(StoreError::Corrupt { source, .. }) => {
                let _guard = self.write_lock.lock().await;
                // A writer may have replaced the file meanwhile.
                let map = self.read_or_reset(&source).await?;
                Ok(map.get(key).cloned())
            }
            Err(e) => Err(e),
        }
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_for_write().await?;
        for (key, value) in entries {
            map.insert((*key).to_string(), value.clone());
        }
        self.write_all(&map).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.read_for_write().await?;
        for key in keys {
            map.remove(*key);
        }
        self.write_all(&map).await
    }
}
