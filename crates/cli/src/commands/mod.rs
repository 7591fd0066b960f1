//! Subcommand implementations.

pub mod admin;
pub mod onboarding;
pub mod show;
pub mod transfer;
pub mod watch;

use seatsync_client::{ClientConfig, ClientError, SyncContext};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

macro_rules! from_client_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CliError {
                fn from(err: $ty) -> Self {
                    Self::Client(err.into())
                }
            }
        )*
    };
}

from_client_error!(
    seatsync_client::ConfigError,
    seatsync_client::FetchError,
    seatsync_client::ActionError,
    seatsync_client::StoreError,
    seatsync_client::AuthError,
    seatsync_client::SyncError,
    seatsync_client::TransferError,
);

/// Build a session context from the environment.
pub async fn connect(config: &ClientConfig) -> Result<SyncContext, CliError> {
    Ok(SyncContext::connect(config).await?)
}

/// Print a value as pretty JSON on stdout.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
