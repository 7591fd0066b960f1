//! Workflow statuses and approval stamps.
//!
//! The remote store keeps statuses as upper-case free text in spreadsheet
//! columns (`systemStatus`, `approvalSTAMP`). These types give them a closed
//! shape on the client side while keeping unknown values intact.

use serde::{Deserialize, Serialize};

/// Workflow position of a user record (`systemStatus` column).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SystemStatus {
    /// Blank cell.
    #[default]
    Unset,
    Active,
    WaitingCheck,
    WaitingApproval,
    WaitingCompletion,
    Completed,
    Declined,
    Retracted,
    Cancelled,
    /// Any value this client does not know about.
    Other(String),
}

impl SystemStatus {
    /// Parse the raw column value. Matching is case-insensitive and trims
    /// surrounding whitespace.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "" => Self::Unset,
            "ACTIVE" => Self::Active,
            "WAITING CHECK" => Self::WaitingCheck,
            "WAITING APPROVAL" => Self::WaitingApproval,
            "WAITING COMPLETION" => Self::WaitingCompletion,
            "COMPLETED" => Self::Completed,
            "DECLINED" => Self::Declined,
            "RETRACTED" => Self::Retracted,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Other(trimmed.to_owned()),
        }
    }

    /// Declined, retracted and cancelled records send the viewer to the
    /// invalid page.
    #[must_use]
    pub const fn is_terminal_negative(&self) -> bool {
        matches!(self, Self::Declined | Self::Retracted | Self::Cancelled)
    }

    /// Statuses that mean the ticket transfer was already accepted.
    #[must_use]
    pub const fn implies_accepted(&self) -> bool {
        matches!(self, Self::WaitingCompletion | Self::Completed)
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => Ok(()),
            Self::Active => write!(f, "ACTIVE"),
            Self::WaitingCheck => write!(f, "WAITING CHECK"),
            Self::WaitingApproval => write!(f, "WAITING APPROVAL"),
            Self::WaitingCompletion => write!(f, "WAITING COMPLETION"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Declined => write!(f, "DECLINED"),
            Self::Retracted => write!(f, "RETRACTED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// A remote-side mark recorded against a user when the ticket transfer was
/// acted upon (`approvalSTAMP` column).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ApprovalStamp {
    /// Accepted at the given timestamp (RFC 3339 as sent by the client).
    Accepted(String),
    /// Declined; stored remotely as the sentinel [`ApprovalStamp::DECLINED`].
    Declined,
}

impl ApprovalStamp {
    /// Sentinel value written to `approvalSTAMP` on decline.
    pub const DECLINED: &'static str = "DECLINED";

    /// Parse the raw column value. Blank means no stamp.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.eq_ignore_ascii_case(Self::DECLINED) {
            Some(Self::Declined)
        } else {
            Some(Self::Accepted(trimmed.to_owned()))
        }
    }

    /// Value sent in the `approvalSTAMP` form field.
    #[must_use]
    pub fn as_form_value(&self) -> &str {
        match self {
            Self::Accepted(at) => at,
            Self::Declined => Self::DECLINED,
        }
    }

    /// The transfer status this stamp settles to.
    #[must_use]
    pub const fn settled_status(&self) -> TransferStatus {
        match self {
            Self::Accepted(_) => TransferStatus::Approved,
            Self::Declined => TransferStatus::Declined,
        }
    }
}

/// Lifecycle of a ticket-transfer page.
///
/// `Approved` and `Declined` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Pending,
    Processing,
    Approved,
    Declined,
}

impl TransferStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Declined)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Approved => write!(f, "approved"),
            Self::Declined => write!(f, "declined"),
        }
    }
}
