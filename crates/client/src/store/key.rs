//! Storage keys and their retention classes.

/// How long an entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Retention {
    /// Until explicitly removed.
    Durable,
    /// Until the store instance is dropped or the entry is removed.
    Session,
}

/// Every key the client persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Identifier of the user this client represents.
    RememberedUserId,
    /// Last fetched record for the remembered user.
    CurrentUser,
    /// Last fetched user collection.
    AllUsers,
    /// Last fetched ticket linked to the current user.
    CurrentTicket,
    /// Last fetched ticket collection.
    AllTickets,
    /// Username of the authenticated administrator.
    AdminUsername,
    /// Full record of the authenticated administrator.
    AdminRecord,
}

impl StoreKey {
    pub const ALL: [Self; 7] = [
        Self::RememberedUserId,
        Self::CurrentUser,
        Self::AllUsers,
        Self::CurrentTicket,
        Self::AllTickets,
        Self::AdminUsername,
        Self::AdminRecord,
    ];

    /// Cached record data, cleared when a logout asks for a full wipe.
    pub const CACHED_RECORDS: [Self; 4] = [
        Self::CurrentUser,
        Self::AllUsers,
        Self::CurrentTicket,
        Self::AllTickets,
    ];

    /// Stable name, used as the file stem for durable entries.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RememberedUserId => "user_id",
            Self::CurrentUser => "user_data",
            Self::AllUsers => "all_users_data",
            Self::CurrentTicket => "ticket_data",
            Self::AllTickets => "all_tickets_data",
            Self::AdminUsername => "logged_in_admin",
            Self::AdminRecord => "admin_data",
        }
    }

    #[must_use]
    pub const fn retention(self) -> Retention {
        match self {
            Self::AdminUsername | Self::AdminRecord => Retention::Session,
            _ => Retention::Durable,
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
