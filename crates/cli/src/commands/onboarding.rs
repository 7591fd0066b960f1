//! Onboarding steps acting on the current user.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use seatsync_client::{ClientConfig, ClientError, Navigation};
use seatsync_core::{ActionResponse, PaymentDetails, QuestionAnswer};
use tracing::info;

use super::{CliError, connect};

#[derive(Debug, Subcommand)]
pub enum OnboardingCommand {
    /// Start the timed interview
    StartInterview {
        #[arg(long)]
        email: String,
    },
    /// Submit interview answers from a JSON file of {question, answer} objects
    SubmitAnswers {
        #[arg(long)]
        file: PathBuf,
    },
    /// Upload the signed employment letter
    UploadLetter {
        #[arg(long)]
        file: PathBuf,
        /// JSON file of {question, answer} hardware responses
        #[arg(long)]
        hardware: Option<PathBuf>,
    },
    /// Upload the signed W-4 with payout details
    UploadW4 {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "")]
        payment_method: String,
        #[arg(long, default_value = "")]
        bank_name: String,
        #[arg(long, default_value = "")]
        account_name: String,
        #[arg(long, default_value = "")]
        account_number: String,
        #[arg(long, default_value = "")]
        routing_number: String,
        #[arg(long, default_value = "")]
        address: String,
    },
    /// Confirm the supervisor verification code
    VerifySupervisor {
        #[arg(long)]
        code: String,
    },
}

/// Resolve the current user, then run one onboarding step.
pub async fn run(
    config: &ClientConfig,
    user: Option<String>,
    command: OnboardingCommand,
) -> Result<(), CliError> {
    let ctx = connect(config).await?;
    let mut nav = Navigation::new("/onboarding");
    if let Some(user) = user {
        nav = nav.with_user(user);
    }
    ctx.start(nav).await?;
    if ctx.current_user().await.is_none() {
        return Err(ClientError::NotFound("current user".to_owned()).into());
    }

    let response = match command {
        OnboardingCommand::StartInterview { email } => ctx.start_interview(&email).await?,
        OnboardingCommand::SubmitAnswers { file } => {
            let answers = read_answers(&file).await?;
            ctx.submit_answers(answers).await?
        }
        OnboardingCommand::UploadLetter { file, hardware } => {
            let letter = read_file(&file).await?;
            let hardware = match hardware {
                Some(path) => read_answers(&path).await?,
                None => Vec::new(),
            };
            ctx.upload_signed_letter(&letter, hardware).await?
        }
        OnboardingCommand::UploadW4 {
            file,
            payment_method,
            bank_name,
            account_name,
            account_number,
            routing_number,
            address,
        } => {
            let w4 = read_file(&file).await?;
            let payment = PaymentDetails {
                payment_method,
                bank_name,
                account_name,
                account_number,
                routing_number,
                address,
            };
            ctx.upload_signed_w4(&w4, payment).await?
        }
        OnboardingCommand::VerifySupervisor { code } => ctx.verify_supervisor(&code).await?,
    };

    log_response(&response);
    Ok(())
}

fn log_response(response: &ActionResponse) {
    info!(
        success = ?response.success,
        details = response.details.as_deref(),
        "Action accepted"
    );
}

async fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    tokio::fs::read(path).await.map_err(|source| CliError::ReadFile {
        path: path.display().to_string(),
        source,
    })
}

async fn read_answers(path: &Path) -> Result<Vec<QuestionAnswer>, CliError> {
    let bytes = read_file(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
