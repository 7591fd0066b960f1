//! Administrator records.
//!
//! Credentials are stored and matched in cleartext by the remote store.
//! This type does not hash or otherwise protect them; it only keeps the
//! password out of `Debug` output.

use serde::{Deserialize, Serialize};

use super::cell;

/// One row of the administrator sheet.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminRecord {
    #[serde(deserialize_with = "cell::text")]
    pub username: String,
    #[serde(deserialize_with = "cell::text")]
    pub password: String,
    /// Display name used when the admin sends correspondence.
    #[serde(deserialize_with = "cell::text")]
    pub sender_name: String,
    /// Reply address used when the admin sends correspondence.
    #[serde(deserialize_with = "cell::text")]
    pub sender_email: String,
}

impl AdminRecord {
    /// Exact username and password equality.
    #[must_use]
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl std::fmt::Debug for AdminRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminRecord")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("sender_name", &self.sender_name)
            .field("sender_email", &self.sender_email)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_requires_both_fields() {
        let admin = AdminRecord {
            username: "alice".to_owned(),
            password: "pw1".to_owned(),
            ..AdminRecord::default()
        };
        assert!(admin.matches("alice", "pw1"));
        assert!(!admin.matches("alice", "pw2"));
        assert!(!admin.matches("Alice", "pw1"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let admin: AdminRecord =
            serde_json::from_str(r#"{"username":"alice","password":"hunter2"}"#).unwrap();
        let debug_output = format!("{admin:?}");
        assert!(debug_output.contains("alice"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }
}
