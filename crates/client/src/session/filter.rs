//! Ownership and search filtering for the administrator views.
//!
//! Both filters keep the input order; neither deduplicates.

use seatsync_core::{TicketRecord, UserRecord};

/// Users owned by `admin`, optionally narrowed by a case-insensitive search.
#[must_use]
pub fn owned_users(users: &[UserRecord], admin: &str, search: Option<&str>) -> Vec<UserRecord> {
    users
        .iter()
        .filter(|u| u.is_owned_by(admin))
        .filter(|u| search_term(search).is_none_or(|term| u.matches_search(term)))
        .cloned()
        .collect()
}

/// Tickets owned by `admin`, optionally narrowed by a case-insensitive search.
#[must_use]
pub fn owned_tickets(tickets: &[TicketRecord], admin: &str, search: Option<&str>) -> Vec<TicketRecord> {
    tickets
        .iter()
        .filter(|t| t.is_owned_by(admin))
        .filter(|t| search_term(search).is_none_or(|term| t.matches_search(term)))
        .cloned()
        .collect()
}

fn search_term(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}
