//! Navigation signals and the record conditions that trigger them.
//!
//! The host owns actual page routing. This module only decides *when* a
//! record state means the session must leave the current page, and carries
//! that decision to the host over a broadcast channel.

use seatsync_core::{TicketRecord, UserRecord};
use tokio::sync::broadcast;
use tracing::info;

const SIGNAL_CAPACITY: usize = 16;

/// Why the session is being sent to the invalid page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// No incoming or remembered user identifier on a user-facing page.
    NoIdentity,
    /// The page's user record could not be found.
    UserNotFound,
    /// The record carries a declined, retracted or cancelled status.
    TerminalStatus,
}

/// A navigation decision for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSignal {
    RedirectInvalid(RedirectReason),
    /// The user's workflow status moved on; route by status.
    AutoNavigate,
    /// Administrator login failed.
    InvalidCredentials,
}

/// Broadcast sender for [`RouteSignal`]s. Cheap to clone.
#[derive(Clone)]
pub struct Signals {
    tx: broadcast::Sender<RouteSignal>,
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

impl Signals {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { tx }
    }

    /// Emit a signal. Having no subscriber is not an error.
    pub fn emit(&self, signal: RouteSignal) {
        info!(?signal, "Route signal");
        let _ = self.tx.send(signal);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RouteSignal> {
        self.tx.subscribe()
    }
}

/// Route for the ticket-transfer page given its authoritative user record.
#[must_use]
pub fn transfer_page_route(user: Option<&UserRecord>) -> Option<RouteSignal> {
    match user {
        None => Some(RouteSignal::RedirectInvalid(RedirectReason::UserNotFound)),
        Some(u) if u.system_status().is_terminal_negative() => {
            Some(RouteSignal::RedirectInvalid(RedirectReason::TerminalStatus))
        }
        Some(_) => None,
    }
}

/// Route for a page showing a single ticket.
#[must_use]
pub fn ticket_page_route(ticket: &TicketRecord) -> Option<RouteSignal> {
    ticket
        .status()
        .is_terminal_negative()
        .then_some(RouteSignal::RedirectInvalid(RedirectReason::TerminalStatus))
}

/// Route for an onboarding step page (interview, letter, W-4, supervisor).
///
/// While the current user is still loading no decision is made.
#[must_use]
pub fn onboarding_page_route(user: Option<&UserRecord>, loading: bool) -> Option<RouteSignal> {
    (user.is_none() && !loading).then_some(RouteSignal::RedirectInvalid(RedirectReason::UserNotFound))
}

/// Route for the "processing" holding page.
#[must_use]
pub fn processing_page_route(user: Option<&UserRecord>) -> Option<RouteSignal> {
    match user {
        None => Some(RouteSignal::RedirectInvalid(RedirectReason::UserNotFound)),
        Some(u) if !u.system_status.trim().is_empty() => Some(RouteSignal::AutoNavigate),
        Some(_) => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(status: &str) -> UserRecord {
        UserRecord {
            user_id: "u1".into(),
            system_status: status.to_owned(),
            ..UserRecord::default()
        }
    }

    #[test]
    fn test_transfer_page_redirects_on_negative_status() {
        for status in ["DECLINED", "RETRACTED", "CANCELLED"] {
            assert_eq!(
                transfer_page_route(Some(&user(status))),
                Some(RouteSignal::RedirectInvalid(RedirectReason::TerminalStatus))
            );
        }
        assert_eq!(transfer_page_route(Some(&user("WAITING APPROVAL"))), None);
        assert_eq!(
            transfer_page_route(None),
            Some(RouteSignal::RedirectInvalid(RedirectReason::UserNotFound))
        );
    }

    #[test]
    fn test_ticket_page_redirects_on_cancelled_ticket() {
        let ticket = TicketRecord {
            status: "CANCELLED".to_owned(),
            ..TicketRecord::default()
        };
        assert!(ticket_page_route(&ticket).is_some());
        assert!(ticket_page_route(&TicketRecord::default()).is_none());
    }

    #[test]
    fn test_onboarding_waits_for_loading() {
        assert_eq!(onboarding_page_route(None, true), None);
        assert!(onboarding_page_route(None, false).is_some());
        assert_eq!(onboarding_page_route(Some(&user("")), false), None);
    }

    #[test]
    fn test_processing_page_moves_on_once_status_set() {
        assert_eq!(processing_page_route(Some(&user(""))), None);
        assert_eq!(
            processing_page_route(Some(&user("WAITING CHECK"))),
            Some(RouteSignal::AutoNavigate)
        );
    }

    #[tokio::test]
    async fn test_signals_reach_subscribers() {
        let signals = Signals::new();
        let mut rx = signals.subscribe();
        signals.emit(RouteSignal::InvalidCredentials);
        assert_eq!(rx.recv().await.unwrap(), RouteSignal::InvalidCredentials);
    }
}
