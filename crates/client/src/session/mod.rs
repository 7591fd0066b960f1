//! Session identity: which user and which administrator this client represents.
//!
//! # User identity
//!
//! Resolved in order from:
//! 1. The identifier carried by the current navigation (it wins and becomes
//!    the remembered identifier)
//! 2. The remembered identifier in durable storage
//! 3. Nothing: administrator pages are exempt, every other page is sent to
//!    the invalid page
//!
//! # Administrator identity
//!
//! Established by [`IdentityResolver::authenticate`] against the fetched
//! roster and kept in session-scoped storage only.
//!
//! Passwords are compared in cleartext against the roster, exactly as the
//! remote store holds them. There is no hashing and no constant-time
//! comparison.

pub mod filter;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use seatsync_core::{AdminRecord, UserId};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::remote::{FetchError, RemoteClient};
use crate::store::{SnapshotStore, StoreError, StoreKey};
use crate::workflow::{RedirectReason, RouteSignal, Signals};

/// Errors that can occur during administrator login.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("could not load administrator roster: {0}")]
    Roster(#[from] FetchError),

    #[error("could not persist administrator session: {0}")]
    Store(#[from] StoreError),
}

/// What the session is currently looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    /// Page path, e.g. `/questions` or `/admin`.
    pub path: String,
    /// User identifier carried by the page (the `id` query parameter).
    pub incoming_user_id: Option<UserId>,
}

impl Navigation {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            incoming_user_id: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.incoming_user_id = Some(user_id.into());
        self
    }

    /// Administrator pages never need a user identity.
    #[must_use]
    pub fn is_admin_page(&self) -> bool {
        self.path.starts_with("/admin")
    }

    fn incoming(&self) -> Option<&UserId> {
        self.incoming_user_id.as_ref().filter(|id| !id.is_unset())
    }
}

/// Outcome of user identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserResolution {
    /// From the navigation; now remembered.
    Incoming(UserId),
    /// From durable storage.
    Remembered(UserId),
    /// No identity, but the page does not need one.
    AdminExempt,
    /// No identity on a page that needs one. A redirect has been signalled.
    Unresolved,
}

impl UserResolution {
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Incoming(id) | Self::Remembered(id) => Some(id),
            Self::AdminExempt | Self::Unresolved => None,
        }
    }
}

/// Resolves user and administrator identity for one session.
///
/// Cheap to clone; clones share the authenticated administrator.
#[derive(Clone)]
pub struct IdentityResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    remote: RemoteClient,
    store: SnapshotStore,
    signals: Signals,
    admin: RwLock<Option<Arc<AdminRecord>>>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(remote: RemoteClient, store: SnapshotStore, signals: Signals) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                remote,
                store,
                signals,
                admin: RwLock::new(None),
            }),
        }
    }

    /// The user identifier to use right now, without side effects.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the remembered identifier cannot be read.
    pub async fn current_user_id(&self, nav: &Navigation) -> Result<Option<UserId>, StoreError> {
        if let Some(id) = nav.incoming() {
            return Ok(Some(id.clone()));
        }
        self.remembered_user_id().await
    }

    /// The remembered user identifier, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if durable storage cannot be read.
    pub async fn remembered_user_id(&self) -> Result<Option<UserId>, StoreError> {
        Ok(self
            .inner
            .store
            .get_json::<UserId>(StoreKey::RememberedUserId)
            .await?
            .filter(|id| !id.is_unset()))
    }

    /// Resolve the user identity for a navigation.
    ///
    /// An incoming identifier is persisted as the remembered one. When no
    /// identity exists on a non-administrator page, exactly one
    /// [`RouteSignal::RedirectInvalid`] is emitted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if durable storage cannot be read or written.
    #[instrument(skip(self), fields(path = %nav.path))]
    pub async fn resolve_user(&self, nav: &Navigation) -> Result<UserResolution, StoreError> {
        if let Some(id) = nav.incoming() {
            self.inner
                .store
                .put_json(StoreKey::RememberedUserId, id)
                .await?;
            debug!(user_id = %id, "Remembered incoming user");
            return Ok(UserResolution::Incoming(id.clone()));
        }

        if let Some(id) = self.remembered_user_id().await? {
            return Ok(UserResolution::Remembered(id));
        }

        if nav.is_admin_page() {
            return Ok(UserResolution::AdminExempt);
        }

        self.inner
            .signals
            .emit(RouteSignal::RedirectInvalid(RedirectReason::NoIdentity));
        Ok(UserResolution::Unresolved)
    }

    /// Forget the remembered user identifier.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the entry cannot be removed.
    pub async fn forget_user(&self) -> Result<(), StoreError> {
        self.inner.store.remove(StoreKey::RememberedUserId).await
    }

    /// Log an administrator in against the remote roster.
    ///
    /// On failure any session-scoped administrator state is cleared and a
    /// [`RouteSignal::InvalidCredentials`] is emitted.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingCredentials` for blank input (nothing is
    /// cleared or signalled), `AuthError::InvalidCredentials` when no roster
    /// entry matches, and `AuthError::Roster` when the roster cannot be
    /// fetched.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AdminRecord, AuthError> {
        if username.is_empty() || password.expose_secret().is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let result = self.try_authenticate(username, password.expose_secret()).await;
        match result {
            Ok(admin) => {
                info!(username, "Administrator logged in");
                Ok(admin)
            }
            Err(e) => {
                warn!(username, error = %e, "Administrator login failed");
                self.clear_admin().await;
                self.inner.signals.emit(RouteSignal::InvalidCredentials);
                Err(e)
            }
        }
    }

    async fn try_authenticate(&self, username: &str, password: &str) -> Result<AdminRecord, AuthError> {
        let roster = self.inner.remote.fetch_admins().await?;
        let admin = roster
            .into_iter()
            .find(|a| a.matches(username, password))
            .ok_or(AuthError::InvalidCredentials)?;
        self.set_admin(admin.clone()).await?;
        Ok(admin)
    }

    /// Restore the administrator from session storage.
    ///
    /// A full stored record is restored directly. A bare username marker is
    /// re-resolved against the roster by username alone. Any failure leaves
    /// the administrator absent and is only logged.
    #[instrument(skip(self))]
    pub async fn rehydrate_admin(&self) -> Option<Arc<AdminRecord>> {
        let store = &self.inner.store;

        match store.get_json::<AdminRecord>(StoreKey::AdminRecord).await {
            Ok(Some(admin)) => {
                let admin = Arc::new(admin);
                *self.inner.admin.write().await = Some(Arc::clone(&admin));
                debug!(username = %admin.username, "Restored administrator session");
                return Some(admin);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Could not read stored administrator");
                return None;
            }
        }

        let username = match store.get_json::<String>(StoreKey::AdminUsername).await {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Could not read administrator marker");
                return None;
            }
        };

        let roster = match self.inner.remote.fetch_admins().await {
            Ok(roster) => roster,
            Err(e) => {
                warn!(username, error = %e, "Could not re-resolve administrator");
                return None;
            }
        };

        let Some(admin) = roster.into_iter().find(|a| a.username == username) else {
            debug!(username, "Administrator marker matches no roster entry");
            return None;
        };

        match self.set_admin(admin).await {
            Ok(admin) => {
                info!(username, "Re-resolved administrator session");
                Some(admin)
            }
            Err(e) => {
                warn!(username, error = %e, "Could not persist re-resolved administrator");
                None
            }
        }
    }

    /// The authenticated administrator, if any.
    pub async fn current_admin(&self) -> Option<Arc<AdminRecord>> {
        self.inner.admin.read().await.clone()
    }

    /// Clear the administrator session.
    pub async fn logout(&self) {
        self.clear_admin().await;
        info!("Administrator logged out");
    }

    async fn set_admin(&self, admin: AdminRecord) -> Result<Arc<AdminRecord>, StoreError> {
        let store = &self.inner.store;
        store.put_json(StoreKey::AdminUsername, &admin.username).await?;
        store.put_json(StoreKey::AdminRecord, &admin).await?;
        let admin = Arc::new(admin);
        *self.inner.admin.write().await = Some(Arc::clone(&admin));
        Ok(admin)
    }

    async fn clear_admin(&self) {
        self.inner.store.clear_session().await;
        *self.inner.admin.write().await = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::test_support::{offline_remote, scratch_dir};

    async fn resolver(dir: &std::path::Path) -> (IdentityResolver, SnapshotStore, Signals) {
        let store = SnapshotStore::open(dir, None).await.unwrap();
        let signals = Signals::new();
        let resolver = IdentityResolver::new(offline_remote(dir), store.clone(), signals.clone());
        (resolver, store, signals)
    }

    #[tokio::test]
    async fn test_incoming_id_wins_and_is_remembered() {
        let dir = scratch_dir();
        let (resolver, store, _) = resolver(&dir).await;
        store.put_json(StoreKey::RememberedUserId, "old").await.unwrap();

        let nav = Navigation::new("/questions").with_user("new");
        let resolved = resolver.resolve_user(&nav).await.unwrap();

        assert_eq!(resolved, UserResolution::Incoming("new".into()));
        assert_eq!(
            resolver.remembered_user_id().await.unwrap(),
            Some("new".into())
        );

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_remembered_id_used_without_incoming() {
        let dir = scratch_dir();
        let (resolver, store, _) = resolver(&dir).await;
        store.put_json(StoreKey::RememberedUserId, "u7").await.unwrap();

        let resolved = resolver.resolve_user(&Navigation::new("/")).await.unwrap();
        assert_eq!(resolved, UserResolution::Remembered("u7".into()));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_blank_incoming_id_is_ignored() {
        let dir = scratch_dir();
        let (resolver, _, _) = resolver(&dir).await;

        let nav = Navigation::new("/admin").with_user("  ");
        let resolved = resolver.resolve_user(&nav).await.unwrap();
        assert_eq!(resolved, UserResolution::AdminExempt);
        assert!(resolver.remembered_user_id().await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_missing_identity_signals_exactly_once() {
        let dir = scratch_dir();
        let (resolver, _, signals) = resolver(&dir).await;
        let mut rx = signals.subscribe();

        let resolved = resolver.resolve_user(&Navigation::new("/questions")).await.unwrap();

        assert_eq!(resolved, UserResolution::Unresolved);
        assert_eq!(
            rx.try_recv().unwrap(),
            RouteSignal::RedirectInvalid(RedirectReason::NoIdentity)
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_admin_pages_are_exempt_from_redirect() {
        let dir = scratch_dir();
        let (resolver, _, signals) = resolver(&dir).await;
        let mut rx = signals.subscribe();

        let resolved = resolver.resolve_user(&Navigation::new("/admin/users")).await.unwrap();

        assert_eq!(resolved, UserResolution::AdminExempt);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_blank_credentials_rejected_without_signal() {
        let dir = scratch_dir();
        let (resolver, _, signals) = resolver(&dir).await;
        let mut rx = signals.subscribe();

        let result = resolver.authenticate("", &SecretString::from("pw")).await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_rehydrate_restores_full_record_without_network() {
        let dir = scratch_dir();
        let (resolver, store, _) = resolver(&dir).await;
        let admin = AdminRecord {
            username: "alice".to_owned(),
            password: "pw".to_owned(),
            ..AdminRecord::default()
        };
        store.put_json(StoreKey::AdminRecord, &admin).await.unwrap();

        let restored = resolver.rehydrate_admin().await.unwrap();
        assert_eq!(restored.username, "alice");
        assert_eq!(resolver.current_admin().await.unwrap().username, "alice");

        resolver.logout().await;
        assert!(resolver.current_admin().await.is_none());
        assert!(store.get(StoreKey::AdminRecord).await.unwrap().is_none());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_rehydrate_without_marker_is_absent() {
        let dir = scratch_dir();
        let (resolver, _, _) = resolver(&dir).await;
        assert!(resolver.rehydrate_admin().await.is_none());
        let _ = std::fs::remove_dir_all(dir);
    }
}
