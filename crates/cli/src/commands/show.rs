//! Print cached (or freshly fetched) snapshots.

use clap::ValueEnum;
use seatsync_client::{ClientConfig, FetchMode, Refresh};
use tracing::{info, warn};

use super::{CliError, connect, print_json};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Target {
    /// The remembered user's record
    User,
    /// The ticket linked from the remembered user
    Ticket,
    /// Every user
    Users,
    /// Every ticket
    Tickets,
}

/// Print one snapshot. With `refresh`, fetch it first.
pub async fn run(config: &ClientConfig, target: Target, refresh: bool) -> Result<(), CliError> {
    let ctx = connect(config).await?;
    ctx.bootstrap().await?;

    if refresh {
        let outcome = match target {
            Target::User => ctx.refresh_current_user(FetchMode::Forced).await,
            Target::Ticket => ctx.refresh_current_ticket(FetchMode::Forced).await,
            Target::Users => ctx.refresh_all_users(FetchMode::Forced).await,
            Target::Tickets => ctx.refresh_all_tickets(FetchMode::Forced).await,
        };
        match outcome {
            Ok(Refresh::Applied) => info!(?target, "Refreshed"),
            Ok(other) => info!(?target, outcome = ?other, "Nothing refreshed"),
            Err(e) => warn!(?target, error = %e, "Refresh failed, showing cached data"),
        }
    }

    match target {
        Target::User => print_json(&ctx.current_user().await.as_deref()),
        Target::Ticket => print_json(&ctx.current_ticket().await.as_deref()),
        Target::Users => {
            let users = ctx.users().await;
            print_json(users.as_deref().map_or(&[][..], Vec::as_slice))
        }
        Target::Tickets => {
            let tickets = ctx.tickets().await;
            print_json(tickets.as_deref().map_or(&[][..], Vec::as_slice))
        }
    }
}
