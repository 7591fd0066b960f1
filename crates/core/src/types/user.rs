//! User records.

use serde::{Deserialize, Serialize};

use super::cell;
use super::id::{TicketId, UserId};
use super::status::{ApprovalStamp, SystemStatus};

/// One row of the user sheet.
///
/// Every column is optional on the wire. Columns this client does not model
/// are kept in `extra` so that caching a record and reading it back is
/// lossless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    #[serde(deserialize_with = "cell::id")]
    pub user_id: UserId,
    /// Username of the administrator who owns this record.
    #[serde(deserialize_with = "cell::text")]
    pub admin: String,

    // Workflow
    #[serde(deserialize_with = "cell::text")]
    pub system_status: String,
    #[serde(deserialize_with = "cell::text")]
    pub title_status: String,
    #[serde(deserialize_with = "cell::text")]
    pub message_status: String,
    #[serde(deserialize_with = "cell::text")]
    pub warning_status: String,
    #[serde(deserialize_with = "cell::text")]
    pub percentage_status: String,
    #[serde(deserialize_with = "cell::text")]
    pub admin_status: String,
    #[serde(deserialize_with = "cell::text")]
    pub verification_code: String,
    #[serde(rename = "approvalSTAMP", deserialize_with = "cell::text")]
    pub approval_stamp: String,

    // Contact
    #[serde(deserialize_with = "cell::text")]
    pub full_name: String,
    #[serde(deserialize_with = "cell::text")]
    pub phone_number: String,
    #[serde(deserialize_with = "cell::text")]
    pub email_address: String,
    #[serde(deserialize_with = "cell::text")]
    pub user_folder_id: String,
    #[serde(deserialize_with = "cell::text")]
    pub help_center_phone: String,
    #[serde(deserialize_with = "cell::text")]
    pub help_center_email_cover: String,

    // Payment
    #[serde(deserialize_with = "cell::text")]
    pub payment_method: String,
    #[serde(deserialize_with = "cell::text")]
    pub bank_name: String,
    #[serde(deserialize_with = "cell::text")]
    pub account_name: String,
    #[serde(deserialize_with = "cell::text")]
    pub account_number: String,
    #[serde(deserialize_with = "cell::text")]
    pub routing_number: String,
    #[serde(deserialize_with = "cell::text")]
    pub address: String,

    // Ticket merged onto the user
    #[serde(deserialize_with = "cell::id")]
    pub ticket_id: TicketId,
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
    #[serde(deserialize_with = "cell::text")]
    pub sender_name: String,
    #[serde(deserialize_with = "cell::text")]
    pub sender_email: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    /// Parsed `systemStatus`.
    #[must_use]
    pub fn system_status(&self) -> SystemStatus {
        SystemStatus::parse(&self.system_status)
    }

    /// Parsed `approvalSTAMP`, if one has been recorded.
    #[must_use]
    pub fn approval(&self) -> Option<ApprovalStamp> {
        ApprovalStamp::parse(&self.approval_stamp)
    }

    /// The linked ticket id, if the cell is not blank.
    #[must_use]
    pub fn linked_ticket_id(&self) -> Option<&TicketId> {
        (!self.ticket_id.is_unset()).then_some(&self.ticket_id)
    }

    /// Whether the record belongs to the given administrator.
    #[must_use]
    pub fn is_owned_by(&self, admin: &str) -> bool {
        self.admin == admin
    }

    /// Case-insensitive search over the columns shown in the admin user table.
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let haystack = [
            self.full_name.as_str(),
            &self.phone_number,
            &self.email_address,
            &self.user_folder_id,
            &self.payment_method,
            &self.bank_name,
            &self.admin_status,
        ]
        .join(" ")
        .to_lowercase();
        haystack.contains(&term.to_lowercase())
    }
}
