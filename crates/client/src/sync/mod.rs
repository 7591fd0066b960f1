//! Synchronization engine.
//!
//! A [`SyncContext`] is the session object: it owns the in-memory snapshots,
//! mirrors them into the [`SnapshotStore`], and exposes them to the rest of
//! the application.
//!
//! # Lifecycle
//!
//! 1. [`SyncContext::start`] loads cached snapshots (stale allowed), restores
//!    the administrator session, resolves the user identity and fetches the
//!    current user and its linked ticket.
//! 2. [`SyncContext::spawn`] runs the staged warm-up once and then polls on a
//!    fixed interval until the returned handle is shut down or dropped.
//!
//! # Ordering
//!
//! Each snapshot slot hands out increasing tokens at fetch start and rejects
//! commits older than the last applied one, so a slow response can never
//! replace a newer one. Poll and warm-up refreshes skip a slot whose fetch is
//! still running; identity changes force a fetch regardless.
//!
//! Failed fetches leave the previous snapshot untouched.

mod schedule;
mod slot;

pub use schedule::{SyncHandle, WarmupStage, WarmupStep, warmup_plan};

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use seatsync_core::{TicketRecord, UserId, UserRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, info, instrument, warn};

use self::slot::{Commit, Slot};
use crate::config::{ClientConfig, ScheduleConfig};
use crate::remote::{FetchError, RemoteClient};
use crate::session::{IdentityResolver, Navigation, UserResolution, filter};
use crate::store::{SnapshotStore, StoreError, StoreKey};
use crate::workflow::{RouteSignal, Signals};

/// Errors from a single refresh.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whether a refresh may run alongside one already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Skip if the slot already has a fetch in flight.
    Guarded,
    /// Always fetch; ordering tokens still discard older responses.
    Forced,
}

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// New snapshot persisted and visible.
    Applied,
    /// A newer response had already landed.
    Stale,
    /// Another fetch for the slot was in flight.
    Skipped,
    /// The collection had no matching record; the snapshot is unchanged.
    NotFound,
    /// No identifier to look up.
    NoIdentity,
}

/// Session-scoped synchronization context.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct SyncContext {
    inner: Arc<SyncInner>,
}

struct SyncInner {
    remote: RemoteClient,
    store: SnapshotStore,
    identity: IdentityResolver,
    signals: Signals,
    schedule: ScheduleConfig,
    navigation: RwLock<Navigation>,
    loading: AtomicBool,
    revision: watch::Sender<u64>,

    current_user: Slot<UserRecord>,
    users: Slot<Vec<UserRecord>>,
    current_ticket: Slot<TicketRecord>,
    tickets: Slot<Vec<TicketRecord>>,
}

impl SyncContext {
    /// Build a context on an already opened store.
    #[must_use]
    pub fn new(remote: RemoteClient, store: SnapshotStore, schedule: ScheduleConfig) -> Self {
        let signals = Signals::new();
        let identity = IdentityResolver::new(remote.clone(), store.clone(), signals.clone());
        let (revision, _) = watch::channel(0);

        Self {
            inner: Arc::new(SyncInner {
                remote,
                store,
                identity,
                signals,
                schedule,
                navigation: RwLock::new(Navigation::default()),
                loading: AtomicBool::new(true),
                revision,
                current_user: Slot::new(StoreKey::CurrentUser),
                users: Slot::new(StoreKey::AllUsers),
                current_ticket: Slot::new(StoreKey::CurrentTicket),
                tickets: Slot::new(StoreKey::AllTickets),
            }),
        }
    }

    /// Open the store and build the remote client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` if the storage directory cannot be created
    /// and `SyncError::Fetch` if the HTTP client cannot be built.
    pub async fn connect(config: &ClientConfig) -> Result<Self, SyncError> {
        let store = SnapshotStore::open(&config.storage_dir, config.session_idle).await?;
        let remote = RemoteClient::new(config)?;
        Ok(Self::new(remote, store, config.schedule))
    }

    /// Load every cached snapshot into memory.
    ///
    /// Corrupt entries are dropped by the store and simply stay empty here.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on filesystem failure.
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        let inner = &self.inner;
        let loaded = [
            inner.current_user.load_cached(&inner.store).await?,
            inner.users.load_cached(&inner.store).await?,
            inner.current_ticket.load_cached(&inner.store).await?,
            inner.tickets.load_cached(&inner.store).await?,
        ];
        let count = loaded.iter().filter(|l| **l).count();
        debug!(count, "Loaded cached snapshots");
        if count > 0 {
            self.bump();
        }
        Ok(())
    }

    /// Start the session on a navigation.
    ///
    /// Fetch failures for the current user are logged, not returned; the
    /// cached snapshot stays visible.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` if durable storage cannot be read or written.
    #[instrument(skip(self), fields(path = %nav.path))]
    pub async fn start(&self, nav: Navigation) -> Result<UserResolution, SyncError> {
        *self.inner.navigation.write().await = nav.clone();
        self.bootstrap().await?;
        if self.inner.identity.rehydrate_admin().await.is_some() {
            self.bump();
        }

        let resolution = self.inner.identity.resolve_user(&nav).await?;
        let cached = self.current_user().await.map(|u| u.user_id.clone());
        if cached.is_some() && cached.as_ref() != resolution.user_id() {
            info!(cached = ?cached, to = ?resolution.user_id(), "Cached user belongs to another identity");
            self.clear_current().await?;
        }
        if resolution.user_id().is_some() {
            self.refresh_logged(FetchMode::Forced).await;
        }
        self.inner.loading.store(false, Ordering::Release);
        self.bump();

        info!(?resolution, "Session started");
        Ok(resolution)
    }

    /// Switch to a new navigation.
    ///
    /// When the effective user identity changes, the current user and ticket
    /// snapshots are cleared (discarding fetches still in flight for the old
    /// identity) and the new identity is fetched.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` if durable storage cannot be read or written.
    #[instrument(skip(self), fields(path = %nav.path))]
    pub async fn set_navigation(&self, nav: Navigation) -> Result<UserResolution, SyncError> {
        let before = self.current_user_id().await?;
        *self.inner.navigation.write().await = nav.clone();
        let resolution = self.inner.identity.resolve_user(&nav).await?;

        if resolution.user_id() != before.as_ref() {
            info!(from = ?before, to = ?resolution.user_id(), "User identity changed");
            self.clear_current().await?;
            if resolution.user_id().is_some() {
                self.inner.loading.store(true, Ordering::Release);
                self.refresh_logged(FetchMode::Forced).await;
                self.inner.loading.store(false, Ordering::Release);
            }
            self.bump();
        }
        Ok(resolution)
    }

    /// The user identifier in effect right now.
    ///
    /// Derived from the live navigation and remembered identifier on every
    /// call.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the remembered identifier cannot be read.
    pub async fn current_user_id(&self) -> Result<Option<UserId>, StoreError> {
        let nav = self.inner.navigation.read().await.clone();
        self.inner.identity.current_user_id(&nav).await
    }

    /// Refresh the current user, then its linked ticket if it changed.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the user fetch or write fails. A failing ticket
    /// follow-up is logged only.
    #[instrument(skip(self))]
    pub async fn refresh_current_user(&self, mode: FetchMode) -> Result<Refresh, SyncError> {
        let Some(id) = self.current_user_id().await? else {
            return Ok(Refresh::NoIdentity);
        };

        let remote = &self.inner.remote;
        let outcome = self
            .run_fetch(&self.inner.current_user, mode, async {
                let users = remote.fetch_users().await?;
                Ok::<_, FetchError>(users.into_iter().find(|u| u.user_id == id))
            })
            .await?;

        if outcome == Refresh::Applied {
            match self.refresh_current_ticket(mode).await {
                Ok(ticket) => debug!(?ticket, "Linked ticket refresh"),
                Err(e) => warn!(error = %e, "Linked ticket refresh failed"),
            }
        }
        if outcome == Refresh::NotFound {
            debug!(user_id = %id, "Current user not in collection");
        }
        Ok(outcome)
    }

    /// Refresh the ticket linked from the current user record.
    ///
    /// A ticket snapshot that the current user no longer links is dropped,
    /// including when the user record links nothing.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the fetch or write fails.
    #[instrument(skip(self))]
    pub async fn refresh_current_ticket(&self, mode: FetchMode) -> Result<Refresh, SyncError> {
        let Some(ticket_id) = self
            .current_user()
            .await
            .and_then(|u| u.linked_ticket_id().cloned())
        else {
            if self.current_ticket().await.is_some() {
                debug!("Current user links no ticket, dropping ticket snapshot");
                self.inner.current_ticket.clear(&self.inner.store).await?;
                self.bump();
            }
            return Ok(Refresh::NoIdentity);
        };

        let remote = &self.inner.remote;
        let outcome = self
            .run_fetch(&self.inner.current_ticket, mode, async {
                let tickets = remote.fetch_tickets().await?;
                Ok::<_, FetchError>(tickets.into_iter().find(|t| t.ticket_id == ticket_id))
            })
            .await?;

        if outcome == Refresh::NotFound
            && self
                .current_ticket()
                .await
                .is_some_and(|t| t.ticket_id != ticket_id)
        {
            debug!(ticket_id = %ticket_id, "Linked ticket not in collection, dropping old ticket snapshot");
            self.inner.current_ticket.clear(&self.inner.store).await?;
            self.bump();
        }
        Ok(outcome)
    }

    /// Replace the user collection.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the fetch or write fails.
    #[instrument(skip(self))]
    pub async fn refresh_all_users(&self, mode: FetchMode) -> Result<Refresh, SyncError> {
        let remote = &self.inner.remote;
        self.run_fetch(&self.inner.users, mode, async {
            Ok::<_, FetchError>(Some(remote.fetch_users().await?))
        })
        .await
    }

    /// Replace the ticket collection.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the fetch or write fails.
    #[instrument(skip(self))]
    pub async fn refresh_all_tickets(&self, mode: FetchMode) -> Result<Refresh, SyncError> {
        let remote = &self.inner.remote;
        self.run_fetch(&self.inner.tickets, mode, async {
            Ok::<_, FetchError>(Some(remote.fetch_tickets().await?))
        })
        .await
    }

    /// Look a user up straight from the remote, bypassing every snapshot.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the user collection cannot be fetched.
    pub async fn fetch_user(&self, id: &UserId) -> Result<Option<UserRecord>, FetchError> {
        let users = self.inner.remote.fetch_users().await?;
        Ok(users.into_iter().find(|u| &u.user_id == id))
    }

    async fn run_fetch<T, Fut>(&self, slot: &Slot<T>, mode: FetchMode, fetch: Fut) -> Result<Refresh, SyncError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        Fut: Future<Output = Result<Option<T>, FetchError>>,
    {
        let ticket = match mode {
            FetchMode::Forced => slot.begin_forced(),
            FetchMode::Guarded => match slot.try_begin() {
                Some(ticket) => ticket,
                None => {
                    debug!(key = %slot.key(), "Fetch already in flight, skipping");
                    return Ok(Refresh::Skipped);
                }
            },
        };

        let Some(value) = fetch.await? else {
            return Ok(Refresh::NotFound);
        };

        match slot.commit(&self.inner.store, ticket.token, value).await? {
            Commit::Applied => {
                self.bump();
                Ok(Refresh::Applied)
            }
            Commit::Stale => Ok(Refresh::Stale),
        }
    }

    async fn refresh_logged(&self, mode: FetchMode) {
        match self.refresh_current_user(mode).await {
            Ok(outcome) => debug!(?outcome, "Identity-driven fetch"),
            Err(e) => warn!(error = %e, "Identity-driven fetch failed"),
        }
    }

    async fn clear_current(&self) -> Result<(), StoreError> {
        let inner = &self.inner;
        inner.current_user.clear(&inner.store).await?;
        inner.current_ticket.clear(&inner.store).await
    }

    /// Log out.
    ///
    /// Always clears the administrator session. With `clear_durable`, also
    /// forgets the remembered user and drops every cached snapshot from
    /// memory and storage.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if durable entries cannot be removed.
    #[instrument(skip(self))]
    pub async fn logout(&self, clear_durable: bool) -> Result<(), StoreError> {
        self.inner.identity.logout().await;
        if clear_durable {
            let inner = &self.inner;
            inner.identity.forget_user().await?;
            inner.current_user.clear(&inner.store).await?;
            inner.users.clear(&inner.store).await?;
            inner.current_ticket.clear(&inner.store).await?;
            inner.tickets.clear(&inner.store).await?;
        }
        self.bump();
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Read side
    // -------------------------------------------------------------------------

    pub async fn current_user(&self) -> Option<Arc<UserRecord>> {
        self.inner.current_user.get().await
    }

    pub async fn current_ticket(&self) -> Option<Arc<TicketRecord>> {
        self.inner.current_ticket.get().await
    }

    pub async fn users(&self) -> Option<Arc<Vec<UserRecord>>> {
        self.inner.users.get().await
    }

    pub async fn tickets(&self) -> Option<Arc<Vec<TicketRecord>>> {
        self.inner.tickets.get().await
    }

    /// Users owned by the authenticated administrator. Empty when nobody is
    /// logged in.
    pub async fn owned_users(&self, search: Option<&str>) -> Vec<UserRecord> {
        let (Some(admin), Some(users)) = (self.inner.identity.current_admin().await, self.users().await) else {
            return Vec::new();
        };
        filter::owned_users(&users, &admin.username, search)
    }

    /// Tickets owned by the authenticated administrator. Empty when nobody is
    /// logged in.
    pub async fn owned_tickets(&self, search: Option<&str>) -> Vec<TicketRecord> {
        let (Some(admin), Some(tickets)) = (self.inner.identity.current_admin().await, self.tickets().await) else {
            return Vec::new();
        };
        filter::owned_tickets(&tickets, &admin.username, search)
    }

    /// Whether the identity-driven fetch for the current navigation is still
    /// outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::Acquire)
    }

    pub async fn navigation(&self) -> Navigation {
        self.inner.navigation.read().await.clone()
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityResolver {
        &self.inner.identity
    }

    #[must_use]
    pub fn remote(&self) -> &RemoteClient {
        &self.inner.remote
    }

    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.inner.store
    }

    #[must_use]
    pub fn schedule(&self) -> &ScheduleConfig {
        &self.inner.schedule
    }

    /// Revision counter, bumped on every visible state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Navigation signals for the host.
    #[must_use]
    pub fn signals(&self) -> broadcast::Receiver<RouteSignal> {
        self.inner.signals.subscribe()
    }

    pub(crate) fn emit(&self, signal: RouteSignal) {
        self.inner.signals.emit(signal);
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|r| *r += 1);
    }
}
