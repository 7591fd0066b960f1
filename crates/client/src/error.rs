//! Unified error type for hosts driving a client session.
//!
//! Each module returns its own error; [`ClientError`] lets a host funnel them
//! into one `Result` with `?`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::remote::{ActionError, FetchError};
use crate::session::AuthError;
use crate::store::StoreError;
use crate::sync::SyncError;
use crate::transfer::TransferError;

/// Any error a client operation can produce.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A collection fetch failed after its retry budget.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// An action was rejected or could not be sent.
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    /// Local storage failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Administrator login failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Ticket-transfer action failed.
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<SyncError> for ClientError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Fetch(e) => Self::Fetch(e),
            SyncError::Store(e) => Self::Store(e),
        }
    }
}
