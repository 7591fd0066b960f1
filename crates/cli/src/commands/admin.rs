//! Administrator commands.
//!
//! The administrator session is session-scoped, so every invocation logs in
//! first and the session ends with the process.

use clap::Subcommand;
use secrecy::SecretString;
use seatsync_client::{ClientConfig, ClientError, FetchMode, SyncContext};
use seatsync_core::{TicketId, UserId};
use tracing::{info, warn};

use super::{CliError, connect, print_json};

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List users owned by the administrator
    Users {
        /// Case-insensitive search over name, phone, email and payment fields
        #[arg(short, long)]
        search: Option<String>,
    },
    /// List tickets owned by the administrator
    Tickets {
        /// Case-insensitive search over event, venue, section and row
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Transfer a ticket from a user to a recipient email
    TransferTicket {
        #[arg(long)]
        ticket: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Soft-delete a ticket
    DeleteTicket {
        #[arg(long)]
        ticket: String,
    },
    /// Send a payment notice to a user
    Pay {
        #[arg(long)]
        user: String,
        /// Extra form fields as key=value
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// File to attach
        #[arg(long)]
        attachment: Option<std::path::PathBuf>,
    },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_owned(), v.to_owned()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

/// Log in, then run one administrator command.
pub async fn run(
    config: &ClientConfig,
    username: &str,
    password: &SecretString,
    command: AdminCommand,
) -> Result<(), CliError> {
    let ctx = connect(config).await?;
    ctx.bootstrap().await?;
    let admin = ctx.identity().authenticate(username, password).await?;
    info!(username = %admin.username, "Logged in");

    match command {
        AdminCommand::Users { search } => {
            refresh_logged(&ctx, Collection::Users).await;
            print_json(&ctx.owned_users(search.as_deref()).await)
        }
        AdminCommand::Tickets { search } => {
            refresh_logged(&ctx, Collection::Tickets).await;
            print_json(&ctx.owned_tickets(search.as_deref()).await)
        }
        AdminCommand::TransferTicket { ticket, from, to } => {
            refresh_logged(&ctx, Collection::Tickets).await;
            ctx.transfer_ticket(&TicketId::new(ticket), &UserId::new(from), &to)
                .await?;
            Ok(())
        }
        AdminCommand::DeleteTicket { ticket } => {
            ctx.delete_ticket(&TicketId::new(ticket)).await?;
            Ok(())
        }
        AdminCommand::Pay {
            user,
            fields,
            attachment,
        } => {
            refresh_logged(&ctx, Collection::Users).await;
            let id = UserId::new(user);
            let record = ctx
                .owned_users(None)
                .await
                .into_iter()
                .find(|u| u.user_id == id)
                .ok_or_else(|| ClientError::NotFound(format!("user {id}")))?;
            let attachment = match attachment {
                Some(path) => Some(read_attachment(&path).await?),
                None => None,
            };
            ctx.send_payment(&record, fields, attachment).await?;
            info!(user_id = %id, "Payment sent");
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Collection {
    Users,
    Tickets,
}

async fn refresh_logged(ctx: &SyncContext, collection: Collection) {
    let result = match collection {
        Collection::Users => ctx.refresh_all_users(FetchMode::Forced).await,
        Collection::Tickets => ctx.refresh_all_tickets(FetchMode::Forced).await,
    };
    if let Err(e) = result {
        warn!(?collection, error = %e, "Refresh failed, using cached data");
    }
}

async fn read_attachment(path: &std::path::Path) -> Result<(String, Vec<u8>), CliError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CliError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    let name = path
        .file_name()
        .map_or_else(|| "attachment".to_owned(), |n| n.to_string_lossy().into_owned());
    Ok((name, bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("amount=12.50").unwrap(),
            ("amount".to_owned(), "12.50".to_owned())
        );
        assert_eq!(
            parse_field("note=a=b").unwrap(),
            ("note".to_owned(), "a=b".to_owned())
        );
        assert!(parse_field("amount").is_err());
        assert!(parse_field("=5").is_err());
    }
}
