//! Long-running session: bootstrap, warm-up and poll until interrupted.

use seatsync_client::{ClientConfig, Navigation, SyncContext};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use super::{CliError, connect};

/// Run a session on `nav` until Ctrl+C or SIGTERM.
pub async fn run(config: &ClientConfig, nav: Navigation) -> Result<(), CliError> {
    let ctx = connect(config).await?;
    let mut signals = ctx.signals();
    let mut revisions = ctx.subscribe();

    let resolution = ctx.start(nav).await?;
    info!(?resolution, "Session resolved");
    report(&ctx).await;

    let handle = ctx.spawn();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                report(&ctx).await;
            }
            signal = signals.recv() => match signal {
                Ok(signal) => warn!(?signal, "Navigation required"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed route signals"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

async fn report(ctx: &SyncContext) {
    let users = ctx.users().await.map_or(0, |u| u.len());
    let tickets = ctx.tickets().await.map_or(0, |t| t.len());
    let current = ctx.current_user().await;
    info!(
        revision = *ctx.subscribe().borrow(),
        users,
        tickets,
        current_user = current.as_ref().map(|u| u.user_id.as_str()),
        status = current.as_ref().map(|u| u.system_status.as_str()),
        admin = ctx.identity().current_admin().await.as_ref().map(|a| a.username.as_str()),
        "Snapshot"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, stopping synchronization");
}
