//! Entity kinds mirrored from the remote store.

use serde::{Deserialize, Serialize};

/// A category of record with its own endpoint and snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Ticket,
    Admin,
}

impl EntityKind {
    /// All kinds, in warm-up order.
    pub const ALL: [Self; 3] = [Self::User, Self::Ticket, Self::Admin];

    /// Stable lowercase name, used in storage keys and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ticket => "ticket",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "ticket" => Ok(Self::Ticket),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid entity kind: {s}")),
        }
    }
}
