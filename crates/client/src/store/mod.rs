//! Local snapshot store.
//!
//! A small key/value surface with two retention classes:
//!
//! - **Durable** entries (remembered identity, cached records and collections)
//!   live as one JSON file per key under the storage directory and survive
//!   process restarts until explicitly removed.
//! - **Session** entries (authenticated administrator) live in an in-memory
//!   `moka` cache owned by this store instance. They are shared by every
//!   client built on the same store and vanish with it, or on logout.
//!
//! Durable writes go to a temporary file that is renamed over the target, so
//! a reader never observes a half-written snapshot.
//!
//! A stored value that fails to deserialize is treated as absent: the entry
//! is removed and `None` is returned. Only I/O failures surface as errors.

mod key;

pub use key::{Retention, StoreKey};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be serialized for writing.
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: StoreKey,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable and session-scoped key/value storage.
///
/// Cheap to clone; clones share the same directory and session cache.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<SnapshotStoreInner>,
}

struct SnapshotStoreInner {
    dir: PathBuf,
    session: Cache<StoreKey, Arc<[u8]>>,
}

impl SnapshotStore {
    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// `session_idle` expires session entries that have not been touched for
    /// that long; `None` keeps them until removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub async fn open(
        dir: impl Into<PathBuf>,
        session_idle: Option<Duration>,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;

        let mut builder = Cache::builder().max_capacity(64);
        if let Some(idle) = session_idle {
            builder = builder.time_to_idle(idle);
        }

        Ok(Self {
            inner: Arc::new(SnapshotStoreInner {
                dir,
                session: builder.build(),
            }),
        })
    }

    /// Directory holding durable entries.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Read raw bytes for a key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if a durable entry exists but cannot be read.
    pub async fn get(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StoreError> {
        match key.retention() {
            Retention::Session => Ok(self.inner.session.get(&key).await.map(|v| v.to_vec())),
            Retention::Durable => {
                let path = self.path_for(key);
                match tokio::fs::read(&path).await {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                    Err(source) => Err(StoreError::Io { path, source }),
                }
            }
        }
    }

    /// Replace the value for a key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if a durable entry cannot be written.
    pub async fn put(&self, key: StoreKey, value: &[u8]) -> Result<(), StoreError> {
        match key.retention() {
            Retention::Session => {
                self.inner.session.insert(key, Arc::from(value)).await;
                Ok(())
            }
            Retention::Durable => {
                let path = self.path_for(key);
                let tmp = self
                    .inner
                    .dir
                    .join(format!(".{}.{}.tmp", key.name(), uuid::Uuid::new_v4()));
                tokio::fs::write(&tmp, value)
                    .await
                    .map_err(|source| StoreError::Io {
                        path: tmp.clone(),
                        source,
                    })?;
                if let Err(source) = tokio::fs::rename(&tmp, &path).await {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(StoreError::Io { path, source });
                }
                debug!(key = %key, bytes = value.len(), "Stored durable entry");
                Ok(())
            }
        }
    }

    /// Remove a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if a durable entry exists but cannot be removed.
    pub async fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        match key.retention() {
            Retention::Session => {
                self.inner.session.invalidate(&key).await;
                Ok(())
            }
            Retention::Durable => {
                let path = self.path_for(key);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                    Err(source) => Err(StoreError::Io { path, source }),
                }
            }
        }
    }

    /// Read and decode a JSON value.
    ///
    /// A value that does not decode as `T` is removed and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` on filesystem failure only.
    pub async fn get_json<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding corrupt stored entry");
                self.remove(key).await?;
                Ok(None)
            }
        }
    }

    /// Encode and store a JSON value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Encode` if `value` cannot be serialized and
    /// `StoreError::Io` if it cannot be written.
    pub async fn put_json<T: Serialize + ?Sized>(&self, key: StoreKey, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Encode { key, source })?;
        self.put(key, &bytes).await
    }

    /// Drop every session-scoped entry.
    pub async fn clear_session(&self) {
        for key in StoreKey::ALL {
            if key.retention() == Retention::Session {
                self.inner.session.invalidate(&key).await;
            }
        }
    }

    fn path_for(&self, key: StoreKey) -> PathBuf {
        self.inner.dir.join(format!("{}.json", key.name()))
    }
}
