//! One snapshot slot per cached record or collection.
//!
//! Each slot pairs an in-memory value with its durable store key and enforces
//! two rules:
//!
//! - Responses are applied in issuance order. Every fetch takes a token from
//!   a monotonically increasing counter before it starts; a commit carrying a
//!   token at or below the last applied one is discarded.
//! - The durable write happens before the in-memory value changes, under the
//!   same lock, so memory never runs ahead of the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::store::{SnapshotStore, StoreError, StoreKey};

pub(crate) struct Slot<T> {
    key: StoreKey,
    issued: AtomicU64,
    in_flight: AtomicUsize,
    applied: Mutex<Applied<T>>,
}

struct Applied<T> {
    token: u64,
    value: Option<Arc<T>>,
}

/// Marks a fetch as in flight for as long as it lives.
pub(crate) struct FetchTicket<'a> {
    in_flight: &'a AtomicUsize,
    pub token: u64,
}

impl Drop for FetchTicket<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Outcome of [`Slot::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Commit {
    Applied,
    Stale,
}

impl<T> Slot<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(key: StoreKey) -> Self {
        Self {
            key,
            issued: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            applied: Mutex::new(Applied {
                token: 0,
                value: None,
            }),
        }
    }

    pub const fn key(&self) -> StoreKey {
        self.key
    }

    /// Start a fetch unless one is already running for this slot.
    pub fn try_begin(&self) -> Option<FetchTicket<'_>> {
        self.in_flight
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(self.ticket())
    }

    /// Start a fetch regardless of any already in flight.
    pub fn begin_forced(&self) -> FetchTicket<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        self.ticket()
    }

    fn ticket(&self) -> FetchTicket<'_> {
        FetchTicket {
            in_flight: &self.in_flight,
            token: self.issued.fetch_add(1, Ordering::AcqRel) + 1,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Current in-memory value.
    pub async fn get(&self) -> Option<Arc<T>> {
        self.applied.lock().await.value.clone()
    }

    /// Persist `value` and make it visible, unless a newer fetch already
    /// landed.
    pub async fn commit(
        &self,
        store: &SnapshotStore,
        token: u64,
        value: T,
    ) -> Result<Commit, StoreError> {
        let mut applied = self.applied.lock().await;
        if token <= applied.token {
            debug!(key = %self.key, token, applied = applied.token, "Discarding stale response");
            return Ok(Commit::Stale);
        }
        store.put_json(self.key, &value).await?;
        applied.token = token;
        applied.value = Some(Arc::new(value));
        Ok(Commit::Applied)
    }

    /// Seed the slot from the store if no fetch has landed yet.
    ///
    /// Returns whether a cached value was loaded.
    pub async fn load_cached(&self, store: &SnapshotStore) -> Result<bool, StoreError> {
        let mut applied = self.applied.lock().await;
        if applied.token > 0 || applied.value.is_some() {
            return Ok(false);
        }
        match store.get_json::<T>(self.key).await? {
            Some(value) => {
                applied.value = Some(Arc::new(value));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop the value from memory and the store.
    ///
    /// Fetches issued before the clear can no longer commit.
    pub async fn clear(&self, store: &SnapshotStore) -> Result<(), StoreError> {
        let mut applied = self.applied.lock().await;
        applied.token = applied.token.max(self.issued.load(Ordering::Acquire));
        applied.value = None;
        store.remove(self.key).await
    }
}
