//! Ticket records.

use serde::{Deserialize, Serialize};

use super::cell;
use super::id::{TicketId, UserId};
use super::status::SystemStatus;

/// One row of the ticket sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TicketRecord {
    #[serde(deserialize_with = "cell::id")]
    pub ticket_id: TicketId,
    #[serde(deserialize_with = "cell::text")]
    pub ticket_title: String,
    #[serde(deserialize_with = "cell::text")]
    pub status: String,

    // Event and seat
    #[serde(deserialize_with = "cell::text")]
    pub event_name: String,
    #[serde(deserialize_with = "cell::text")]
    pub venue: String,
    #[serde(deserialize_with = "cell::text")]
    pub location: String,
    #[serde(deserialize_with = "cell::text")]
    pub date_time: String,
    #[serde(deserialize_with = "cell::text")]
    pub section: String,
    #[serde(deserialize_with = "cell::text")]
    pub section_no: String,
    #[serde(deserialize_with = "cell::text")]
    pub row: String,
    #[serde(deserialize_with = "cell::text")]
    pub seat_numbers: String,

    // Ownership
    #[serde(deserialize_with = "cell::id")]
    pub user_id: UserId,
    #[serde(deserialize_with = "cell::text")]
    pub admin: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TicketRecord {
    /// Parsed `status` column. Tickets share the user workflow vocabulary
    /// for their negative terminal states.
    #[must_use]
    pub fn status(&self) -> SystemStatus {
        SystemStatus::parse(&self.status)
    }

    /// Whether the ticket belongs to the given administrator.
    #[must_use]
    pub fn is_owned_by(&self, admin: &str) -> bool {
        self.admin == admin
    }

    /// Whether the ticket is held by the given user.
    #[must_use]
    pub fn is_held_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }

    /// Case-insensitive search over event, venue, section and row.
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let haystack = format!(
            "{} {} {} {}",
            self.event_name, self.venue, self.section, self.row
        )
        .to_lowercase();
        haystack.contains(&term.to_lowercase())
    }
}
