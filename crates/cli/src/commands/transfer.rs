//! Accept or decline a ticket transfer.

use clap::ValueEnum;
use seatsync_client::{ClientConfig, Mount, TransferView};
use seatsync_core::UserId;
use serde_json::json;
use tracing::{info, warn};

use super::{CliError, connect, print_json};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Decision {
    Accept,
    Decline,
    /// Only show the current state
    Status,
}

/// Open the transfer page for `user_id` and apply `decision`.
pub async fn run(config: &ClientConfig, user_id: &str, decision: Decision) -> Result<(), CliError> {
    let ctx = connect(config).await?;
    let page = match ctx.open_transfer(&UserId::new(user_id)).await? {
        Mount::Ready(page) => page,
        Mount::Redirect(signal) => {
            warn!(?signal, "Transfer page unavailable");
            return print_json(&json!({ "redirect": format!("{signal:?}") }));
        }
    };

    let before = page.view();
    if before.actions_offered {
        let result = match decision {
            Decision::Accept => Some(page.accept().await),
            Decision::Decline => Some(page.decline().await),
            Decision::Status => None,
        };
        match result {
            Some(Ok(status)) => info!(%status, "Transfer settled"),
            Some(Err(e)) => warn!(error = %e, "Transfer action failed"),
            None => {}
        }
    } else {
        info!(status = %before.status, "No transfer action available");
    }

    print_view(&page.view())
}

fn print_view(view: &TransferView) -> Result<(), CliError> {
    print_json(&json!({
        "status": view.status,
        "actionsOffered": view.actions_offered,
        "error": view.error,
    }))
}
