//! Ticket-transfer approval page.
//!
//! ```text
//! pending --accept--> processing --settle--> approved
//! pending --decline-> processing --settle--> declined
//!            processing --send failure--> pending (+ error)
//! ```
//!
//! The page keeps its own state, separate from the synchronized snapshots.
//! Nothing here writes to the shared cache; the remote stamp reaches the
//! cache on a later poll.
//!
//! Terminal state is derived from the authoritative user record on mount and
//! on every [`TransferPage::observe`], so a page opened after an action never
//! offers accept or decline again, whatever the page itself remembers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use seatsync_core::{ApprovalStamp, RemoteAction, TransferStatus, UserId, UserRecord};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::remote::{ActionError, FetchError, RemoteClient};
use crate::sync::SyncContext;
use crate::workflow::{self, RouteSignal};

/// Errors that can occur when acting on a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("could not send approval: {0}")]
    Action(#[from] ActionError),
}

/// Result of mounting the page.
pub enum Mount {
    Ready(TransferPage),
    /// The page must not be shown.
    Redirect(RouteSignal),
}

/// What the page should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferView {
    pub status: TransferStatus,
    /// Whether accept and decline controls are shown.
    pub actions_offered: bool,
    /// Last send failure, cleared by the next attempt.
    pub error: Option<String>,
}

/// Page-scoped transfer state machine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TransferPage {
    inner: Arc<PageInner>,
}

struct PageInner {
    remote: RemoteClient,
    settle: Duration,
    state: Mutex<PageState>,
}

struct PageState {
    user: UserRecord,
    status: TransferStatus,
    /// Stamp this page sent successfully.
    sent: Option<ApprovalStamp>,
    error: Option<String>,
}

impl PageState {
    fn can_act(&self) -> bool {
        self.status == TransferStatus::Pending && self.sent.is_none() && self.user.approval().is_none()
    }
}

/// Status implied by an authoritative record.
fn derived_status(user: &UserRecord) -> TransferStatus {
    if let Some(stamp) = user.approval() {
        return stamp.settled_status();
    }
    if user.system_status().implies_accepted() {
        return TransferStatus::Approved;
    }
    TransferStatus::Pending
}

impl TransferPage {
    /// Mount the page for the authoritative record of its user.
    ///
    /// `settle` is how long to wait after the action is delivered before
    /// showing the terminal state.
    #[must_use]
    pub fn mount(remote: RemoteClient, settle: Duration, user: Option<UserRecord>) -> Mount {
        if let Some(signal) = workflow::transfer_page_route(user.as_ref()) {
            return Mount::Redirect(signal);
        }
        let Some(user) = user else {
            return Mount::Redirect(RouteSignal::RedirectInvalid(
                workflow::RedirectReason::UserNotFound,
            ));
        };

        let status = derived_status(&user);
        Mount::Ready(Self {
            inner: Arc::new(PageInner {
                remote,
                settle,
                state: Mutex::new(PageState {
                    user,
                    status,
                    sent: None,
                    error: None,
                }),
            }),
        })
    }

    /// Accept the transfer.
    ///
    /// A no-op returning the current status when a stamp already exists or
    /// another action is running.
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Action` if the approval could not be
    /// delivered; the page is back in `pending` with the error recorded.
    pub async fn accept(&self) -> Result<TransferStatus, TransferError> {
        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.act(ApprovalStamp::Accepted(at)).await
    }

    /// Decline the transfer. Same guard and failure behavior as
    /// [`TransferPage::accept`].
    ///
    /// # Errors
    ///
    /// Returns `TransferError::Action` if the decline could not be delivered.
    pub async fn decline(&self) -> Result<TransferStatus, TransferError> {
        self.act(ApprovalStamp::Declined).await
    }

    #[instrument(skip(self), fields(user_id = %self.user_id()))]
    async fn act(&self, stamp: ApprovalStamp) -> Result<TransferStatus, TransferError> {
        let user_id = {
            let mut state = self.lock();
            if !state.can_act() {
                info!(status = %state.status, "Transfer already acted on, ignoring");
                return Ok(state.status);
            }
            state.status = TransferStatus::Processing;
            state.error = None;
            state.user.user_id.clone()
        };
        let mut processing = ProcessingGuard { page: self, armed: true };

        let action = RemoteAction::TicketApproval {
            user_id,
            stamp: stamp.clone(),
        };
        if let Err(e) = self.inner.remote.dispatch_action(&action).await {
            warn!(error = %e, "Transfer action failed");
            processing.armed = false;
            let mut state = self.lock();
            state.status = TransferStatus::Pending;
            state.error = Some(e.to_string());
            return Err(e.into());
        }

        tokio::time::sleep(self.inner.settle).await;

        processing.armed = false;
        let mut state = self.lock();
        state.status = stamp.settled_status();
        state.sent = Some(stamp);
        info!(status = %state.status, "Transfer settled");
        Ok(state.status)
    }

    /// Re-check against a newer authoritative record for the same user.
    ///
    /// A recorded stamp forces the terminal state. Returns a signal when the
    /// record now requires leaving the page.
    pub fn observe(&self, user: &UserRecord) -> Option<RouteSignal> {
        let mut state = self.lock();
        if user.user_id != state.user.user_id {
            return None;
        }
        if let Some(signal) = workflow::transfer_page_route(Some(user)) {
            return Some(signal);
        }

        state.user = user.clone();
        if state.status != TransferStatus::Processing && !state.status.is_terminal() {
            state.status = derived_status(user);
        } else if let Some(stamp) = user.approval() {
            state.status = stamp.settled_status();
        }
        None
    }

    /// Current render state.
    #[must_use]
    pub fn view(&self) -> TransferView {
        let state = self.lock();
        TransferView {
            status: state.status,
            actions_offered: state.can_act(),
            error: state.error.clone(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.lock().user.user_id.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncContext {
    /// Mount the transfer page for `user_id` from a fresh remote lookup.
    ///
    /// A redirect is also emitted on the signal channel.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the user collection cannot be fetched.
    #[instrument(skip(self))]
    pub async fn open_transfer(&self, user_id: &UserId) -> Result<Mount, FetchError> {
        let user = self.fetch_user(user_id).await?;
        let mount = TransferPage::mount(self.remote().clone(), self.schedule().action_settle, user);
        if let Mount::Redirect(signal) = &mount {
            self.emit(*signal);
        }
        Ok(mount)
    }
}

/// Returns the page to `pending` if an action is dropped mid-flight.
struct ProcessingGuard<'a> {
    page: &'a TransferPage,
    armed: bool,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.page.lock();
            if state.status == TransferStatus::Processing {
                state.status = TransferStatus::Pending;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::{offline_remote, scratch_dir};
    use crate::workflow::RedirectReason;

    fn user(status: &str, stamp: &str) -> UserRecord {
        UserRecord {
            user_id: "u1".into(),
            system_status: status.to_owned(),
            approval_stamp: stamp.to_owned(),
            ..UserRecord::default()
        }
    }

    fn mount(user: Option<UserRecord>) -> Mount {
        let dir = scratch_dir();
        TransferPage::mount(offline_remote(&dir), Duration::from_secs(10), user)
    }

    fn ready(user: UserRecord) -> TransferPage {
        match mount(Some(user)) {
            Mount::Ready(page) => page,
            Mount::Redirect(signal) => panic!("unexpected redirect: {signal:?}"),
        }
    }

    #[test]
    fn test_mount_redirects_without_record_or_on_negative_status() {
        assert!(matches!(
            mount(None),
            Mount::Redirect(RouteSignal::RedirectInvalid(RedirectReason::UserNotFound))
        ));
        assert!(matches!(
            mount(Some(user("RETRACTED", ""))),
            Mount::Redirect(RouteSignal::RedirectInvalid(RedirectReason::TerminalStatus))
        ));
    }

    #[test]
    fn test_mount_derives_terminal_state_from_stamp() {
        let page = ready(user("WAITING APPROVAL", "2025-01-01T00:00:00.000Z"));
        let view = page.view();
        assert_eq!(view.status, TransferStatus::Approved);
        assert!(!view.actions_offered);

        let page = ready(user("WAITING APPROVAL", "DECLINED"));
        assert_eq!(page.view().status, TransferStatus::Declined);
        assert!(!page.view().actions_offered);
    }

    #[test]
    fn test_mount_treats_completion_statuses_as_approved() {
        let page = ready(user("WAITING COMPLETION", ""));
        assert_eq!(page.view().status, TransferStatus::Approved);
        assert!(!page.view().actions_offered);
    }

    #[test]
    fn test_pending_record_offers_actions() {
        let page = ready(user("WAITING APPROVAL", ""));
        let view = page.view();
        assert_eq!(view.status, TransferStatus::Pending);
        assert!(view.actions_offered);
        assert!(view.error.is_none());
    }

    #[tokio::test]
    async fn test_accept_is_noop_once_stamped() {
        let page = ready(user("WAITING APPROVAL", "DECLINED"));
        // No request is made: the offline remote would fail it.
        assert_eq!(page.accept().await.unwrap(), TransferStatus::Declined);
        assert_eq!(page.decline().await.unwrap(), TransferStatus::Declined);
    }

    #[tokio::test]
    async fn test_send_failure_returns_to_pending_with_error() {
        let page = ready(user("WAITING APPROVAL", ""));

        let result = page.accept().await;

        assert!(matches!(result, Err(TransferError::Action(_))));
        let view = page.view();
        assert_eq!(view.status, TransferStatus::Pending);
        assert!(view.actions_offered);
        assert!(view.error.is_some());
    }

    #[test]
    fn test_observe_applies_remote_stamp() {
        let page = ready(user("WAITING APPROVAL", ""));
        assert!(page.observe(&user("WAITING APPROVAL", "2025-01-01T00:00:00.000Z")).is_none());
        assert_eq!(page.view().status, TransferStatus::Approved);

        // A stale pending-shaped record never reopens the actions.
        assert!(page.observe(&user("WAITING APPROVAL", "")).is_none());
        assert_eq!(page.view().status, TransferStatus::Approved);
        assert!(!page.view().actions_offered);
    }

    #[test]
    fn test_observe_other_user_is_ignored() {
        let page = ready(user("WAITING APPROVAL", ""));
        let other = UserRecord {
            user_id: "u2".into(),
            approval_stamp: "DECLINED".to_owned(),
            ..UserRecord::default()
        };
        assert!(page.observe(&other).is_none());
        assert_eq!(page.view().status, TransferStatus::Pending);
    }

    #[test]
    fn test_observe_signals_on_cancellation() {
        let page = ready(user("WAITING APPROVAL", ""));
        assert_eq!(
            page.observe(&user("CANCELLED", "")),
            Some(RouteSignal::RedirectInvalid(RedirectReason::TerminalStatus))
        );
    }
}
