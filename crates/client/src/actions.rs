//! Workflow actions posted on behalf of the current user or administrator.
//!
//! Onboarding steps act on the current user and wait for the settle delay
//! after the remote accepts them, so the backend can finish its side effects
//! before the next page reads the record. Administrator operations return as
//! soon as the remote answers.
//!
//! None of these touch the cached snapshots.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{SecondsFormat, Utc};
use seatsync_core::{
    ActionResponse, Attachment, PaymentDetails, QuestionAnswer, RemoteAction, TicketId, UserId,
    UserRecord, excel_serial,
};
use tracing::{info, instrument};

use crate::remote::ActionError;
use crate::sync::SyncContext;

impl SyncContext {
    /// Start the timed interview.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for a blank email or a missing
    /// current user, and any posting error otherwise.
    #[instrument(skip(self))]
    pub async fn start_interview(&self, email: &str) -> Result<ActionResponse, ActionError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ActionError::Validation("email address is required".to_owned()));
        }
        let user = self.require_user().await?;
        self.remote()
            .post_action(&RemoteAction::StartInterview {
                user_id: user.user_id.clone(),
                email_address: email.to_owned(),
                time_in: excel_serial(Utc::now()),
            })
            .await
    }

    /// Submit interview answers.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` without a current user, and any
    /// posting error otherwise.
    #[instrument(skip(self, answers), fields(answers = answers.len()))]
    pub async fn submit_answers(&self, answers: Vec<QuestionAnswer>) -> Result<ActionResponse, ActionError> {
        let user = self.require_user().await?;
        let action = RemoteAction::SubmitAnswers {
            user_id: user.user_id.clone(),
            answers,
            time_out: excel_serial(Utc::now()),
        };
        self.post_and_settle(&action).await
    }

    /// Upload the signed employment letter with the hardware questionnaire.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for an empty document or a missing
    /// current user, and any posting error otherwise.
    #[instrument(skip(self, letter, hardware), fields(bytes = letter.len()))]
    pub async fn upload_signed_letter(
        &self,
        letter: &[u8],
        hardware: Vec<QuestionAnswer>,
    ) -> Result<ActionResponse, ActionError> {
        if letter.is_empty() {
            return Err(ActionError::Validation("signed letter is required".to_owned()));
        }
        let user = self.require_user().await?;
        let action = RemoteAction::UploadSignedLetter {
            user_id: user.user_id.clone(),
            user_folder_id: user.user_folder_id.clone(),
            signed_letter_base64: STANDARD.encode(letter),
            hardware_response: hardware,
        };
        self.post_and_settle(&action).await
    }

    /// Upload the signed W-4 with payout details.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for an empty document or a missing
    /// current user, and any posting error otherwise.
    #[instrument(skip(self, w4, payment), fields(bytes = w4.len()))]
    pub async fn upload_signed_w4(
        &self,
        w4: &[u8],
        payment: PaymentDetails,
    ) -> Result<ActionResponse, ActionError> {
        if w4.is_empty() {
            return Err(ActionError::Validation("signed W-4 is required".to_owned()));
        }
        let user = self.require_user().await?;
        let action = RemoteAction::UploadSignedW4 {
            user_id: user.user_id.clone(),
            user_folder_id: user.user_folder_id.clone(),
            signed_w4_base64: STANDARD.encode(w4),
            payment,
            uploaded_at: excel_serial(Utc::now()),
        };
        self.post_and_settle(&action).await
    }

    /// Confirm the supervisor verification code and mark the user contacted.
    ///
    /// The code is checked against the current record before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` for a blank or wrong code or a
    /// missing current user, and any posting error otherwise.
    #[instrument(skip(self, code))]
    pub async fn verify_supervisor(&self, code: &str) -> Result<ActionResponse, ActionError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ActionError::Validation("verification code is required".to_owned()));
        }
        let user = self.require_user().await?;
        if user.verification_code != code {
            return Err(ActionError::Validation("invalid verification code".to_owned()));
        }
        let action = RemoteAction::SetContacted {
            user_id: user.user_id.clone(),
        };
        self.post_and_settle(&action).await
    }

    /// Transfer a ticket held by `from_user` to a recipient email.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when no administrator is logged in,
    /// the email is malformed, or the cached ticket collection does not show
    /// `from_user` holding the ticket.
    #[instrument(skip(self))]
    pub async fn transfer_ticket(
        &self,
        ticket_id: &TicketId,
        from_user: &UserId,
        to_email: &str,
    ) -> Result<ActionResponse, ActionError> {
        self.require_admin().await?;
        let to_email = to_email.trim();
        if to_email.is_empty() || !to_email.contains('@') {
            return Err(ActionError::Validation("a valid recipient email is required".to_owned()));
        }
        let held = self
            .tickets()
            .await
            .is_some_and(|t| t.iter().any(|t| &t.ticket_id == ticket_id && t.is_held_by(from_user)));
        if !held {
            return Err(ActionError::Validation(format!(
                "ticket {ticket_id} is not held by user {from_user}"
            )));
        }

        let response = self
            .remote()
            .post_action(&RemoteAction::TransferTicket {
                ticket_id: ticket_id.clone(),
                from_user_id: from_user.clone(),
                to_email: to_email.to_owned(),
            })
            .await?;
        info!("Ticket transfer initiated");
        Ok(response)
    }

    /// Soft-delete a ticket.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when no administrator is logged in,
    /// and any posting error otherwise.
    #[instrument(skip(self))]
    pub async fn delete_ticket(&self, ticket_id: &TicketId) -> Result<ActionResponse, ActionError> {
        self.require_admin().await?;
        let response = self
            .remote()
            .post_action(&RemoteAction::DeleteTicket {
                ticket_id: ticket_id.clone(),
                deleted_stamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            })
            .await?;
        info!("Ticket deleted");
        Ok(response)
    }

    /// Send a payment notice for a user, with an optional attachment.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Validation` when no administrator is logged in,
    /// and any posting error otherwise.
    #[instrument(skip(self, user, fields, attachment), fields(user_id = %user.user_id))]
    pub async fn send_payment(
        &self,
        user: &UserRecord,
        fields: Vec<(String, String)>,
        attachment: Option<(String, Vec<u8>)>,
    ) -> Result<ActionResponse, ActionError> {
        self.require_admin().await?;
        let attachment = attachment.map(|(name, bytes)| Attachment {
            name,
            base64: STANDARD.encode(bytes),
        });
        self.remote()
            .post_action(&RemoteAction::SendPayment {
                user_id: user.user_id.clone(),
                user_folder_id: user.user_folder_id.clone(),
                fields,
                attachment,
            })
            .await
    }

    async fn post_and_settle(&self, action: &RemoteAction) -> Result<ActionResponse, ActionError> {
        let response = self.remote().post_action(action).await?;
        tokio::time::sleep(self.schedule().action_settle).await;
        Ok(response)
    }

    /// The current user record, only while it matches the identity in effect.
    async fn require_user(&self) -> Result<std::sync::Arc<UserRecord>, ActionError> {
        let expected = self
            .current_user_id()
            .await
            .map_err(|e| ActionError::Validation(format!("user identity unavailable: {e}")))?;
        self.current_user()
            .await
            .filter(|u| expected.as_ref() == Some(&u.user_id))
            .ok_or_else(|| ActionError::Validation("no current user".to_owned()))
    }

    async fn require_admin(&self) -> Result<(), ActionError> {
        if self.identity().current_admin().await.is_none() {
            return Err(ActionError::Validation("administrator login required".to_owned()));
        }
        Ok(())
    }
}
