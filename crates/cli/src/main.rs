//! Seatsync CLI - Host process for a client session.
//!
//! # Usage
//!
//! ```bash
//! # Keep a session synchronized until Ctrl+C
//! seatsync watch --user 1042
//!
//! # Print cached snapshots, optionally refreshing first
//! seatsync show users --refresh
//!
//! # Administrator views (logs in for the duration of the command)
//! seatsync admin -u alice -p secret users --search smith
//!
//! # Accept a ticket transfer
//! seatsync transfer 1042 accept
//!
//! # Forget the remembered user and drop cached snapshots
//! seatsync logout --all
//! ```
//!
//! # Commands
//!
//! - `watch` - Bootstrap, warm up and poll until interrupted
//! - `show` - Print a cached snapshot
//! - `admin` - Administrator listings and ticket operations
//! - `transfer` - Ticket-transfer approval
//! - `onboarding` - Interview, document upload and supervisor steps
//! - `logout` - Clear session and cached state
//!
//! # Environment Variables
//!
//! See `seatsync_client::config` for endpoint and timing variables.
//! `SEATSYNC_LOG_FORMAT=json` switches log output to JSON lines.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use seatsync_client::{ClientConfig, Navigation};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;
use commands::admin::AdminCommand;
use commands::onboarding::OnboardingCommand;
use commands::show::Target;
use commands::transfer::Decision;

#[derive(Parser)]
#[command(name = "seatsync")]
#[command(author, version, about = "Seatsync client session tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep a session synchronized until interrupted
    Watch {
        /// Page path the session is on
        #[arg(long, default_value = "/")]
        path: String,
        /// Incoming user identifier
        #[arg(long)]
        user: Option<String>,
    },
    /// Print a cached snapshot
    Show {
        #[arg(value_enum)]
        target: Target,
        /// Fetch before printing
        #[arg(long)]
        refresh: bool,
    },
    /// Log in as an administrator and run a command
    Admin {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
        #[command(subcommand)]
        command: AdminCommand,
    },
    /// Act on a ticket transfer
    Transfer {
        /// User identifier the transfer was sent to
        user: String,
        #[arg(value_enum, default_value = "status")]
        decision: Decision,
    },
    /// Run an onboarding step for the current user
    Onboarding {
        /// Incoming user identifier (defaults to the remembered one)
        #[arg(long)]
        user: Option<String>,
        #[command(subcommand)]
        command: OnboardingCommand,
    },
    /// Clear the administrator session, and with --all every cached snapshot
    Logout {
        #[arg(long)]
        all: bool,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "seatsync_client=info,seatsync_cli=info".into());
    let json = std::env::var("SEATSYNC_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter));

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Watch { path, user } => {
            let mut nav = Navigation::new(path);
            if let Some(user) = user {
                nav = nav.with_user(user);
            }
            commands::watch::run(config, nav).await
        }
        Commands::Show { target, refresh } => commands::show::run(config, target, refresh).await,
        Commands::Admin {
            username,
            password,
            command,
        } => {
            let password = SecretString::from(password);
            commands::admin::run(config, &username, &password, command).await
        }
        Commands::Transfer { user, decision } => commands::transfer::run(config, &user, decision).await,
        Commands::Onboarding { user, command } => commands::onboarding::run(config, user, command).await,
        Commands::Logout { all } => {
            let ctx = commands::connect(config).await?;
            ctx.logout(all).await?;
            tracing::info!(all, "Logged out");
            Ok(())
        }
    }
}
