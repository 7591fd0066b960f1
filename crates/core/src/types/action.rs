//! Commands posted to the remote action endpoint.
//!
//! Every command is sent as an `application/x-www-form-urlencoded` body whose
//! first field is `action`. The remote answers with a small JSON object that
//! either signals success or carries an `error`/`details` message.

use serde::{Deserialize, Serialize};

use super::id::{TicketId, UserId};
use super::status::ApprovalStamp;

/// A file sent inline as base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    /// Base64 payload without a data-URL prefix.
    pub base64: String,
}

/// One answered interview question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// Payout details captured alongside the signed W-4.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentDetails {
    pub payment_method: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub routing_number: String,
    pub address: String,
}

/// A remote action command.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteAction {
    /// Move a ticket from one user to a recipient email.
    TransferTicket {
        ticket_id: TicketId,
        from_user_id: UserId,
        to_email: String,
    },
    /// Soft-delete a ticket.
    DeleteTicket {
        ticket_id: TicketId,
        deleted_stamp: String,
    },
    /// Accept or decline a transferred ticket.
    TicketApproval {
        user_id: UserId,
        stamp: ApprovalStamp,
    },
    /// Submit interview answers. `time_out` is a spreadsheet serial date.
    SubmitAnswers {
        user_id: UserId,
        answers: Vec<QuestionAnswer>,
        time_out: f64,
    },
    /// Start the timed interview. `time_in` is a spreadsheet serial date.
    StartInterview {
        user_id: UserId,
        email_address: String,
        time_in: f64,
    },
    UploadSignedLetter {
        user_id: UserId,
        user_folder_id: String,
        signed_letter_base64: String,
        hardware_response: Vec<QuestionAnswer>,
    },
    UploadSignedW4 {
        user_id: UserId,
        user_folder_id: String,
        signed_w4_base64: String,
        payment: PaymentDetails,
        uploaded_at: f64,
    },
    /// Mark that the user reached their supervisor.
    SetContacted { user_id: UserId },
    SendPayment {
        user_id: UserId,
        user_folder_id: String,
        fields: Vec<(String, String)>,
        attachment: Option<Attachment>,
    },
}

impl RemoteAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TransferTicket { .. } => "transferTicket",
            Self::DeleteTicket { .. } => "deleteTicket",
            Self::TicketApproval { .. } => "ticketApproval",
            Self::SubmitAnswers { .. } => "submitAnswers",
            Self::StartInterview { .. } => "startInterview",
            Self::UploadSignedLetter { .. } => "uploadSignedLetter",
            Self::UploadSignedW4 { .. } => "uploadSignedW4",
            Self::SetContacted { .. } => "setContacted",
            Self::SendPayment { .. } => "sendPayment",
        }
    }

    /// Form fields in send order, `action` first.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![pair("action", self.name())];
        match self {
            Self::TransferTicket {
                ticket_id,
                from_user_id,
                to_email,
            } => {
                fields.push(pair("ticketId", ticket_id.as_str()));
                fields.push(pair("fromUserId", from_user_id.as_str()));
                fields.push(pair("toEmail", to_email));
            }
            Self::DeleteTicket {
                ticket_id,
                deleted_stamp,
            } => {
                fields.push(pair("ticketId", ticket_id.as_str()));
                fields.push(pair("deletedSTAMP", deleted_stamp));
            }
            Self::TicketApproval { user_id, stamp } => {
                fields.push(pair("userId", user_id.as_str()));
                fields.push(pair("approvalSTAMP", stamp.as_form_value()));
            }
            Self::SubmitAnswers {
                user_id,
                answers,
                time_out,
            } => {
                fields.push(pair("userId", user_id.as_str()));
                fields.push(pair("interviewResponse", &to_json(answers)));
                fields.push(pair("timeOut", &time_out.to_string()));
            }
            Self::StartInterview {
                user_id,
                email_address,
                time_in,
            } => {
                fields.push(pair("userId", user_id.as_str()));
                fields.push(pair("emailAddress", email_address));
                fields.push(pair("timeIn", &time_in.to_string()));
            }
            Self::UploadSignedLetter {
                user_id,
                user_folder_id,
                signed_letter_base64,
                hardware_response,
            } => {
                fields.push(pair("userId", user_id.as_str()));
                fields.push(pair("userFolderId", user_folder_id));
                fields.push(pair("signedLetter", signed_letter_base64));
                fields.push(pair("hardwareResponse", &to_json(hardware_response)));
            }
            Self::UploadSignedW4 {
                user_id,
                user_folder_id,
                signed_w4_base64,
                payment,
                uploaded_at,
            } => {
                fields.push(pair("userId", user_id.as_str()));
                fields.push(pair("userFolderId", user_folder_id));
                fields.push(pair("signedW4", signed_w4_base64));
                fields.push(pair("paymentMethod", &payment.payment_method));
                fields.push(pair("bankName", &payment.bank_name));
                fields.push(pair("accountName", &payment.account_name));
                fields.push(pair("accountNumber", &payment.account_number));
                fields.push(pair("routingNumber", &payment.routing_number));
                fields.push(pair("address", &payment.address));
                fields.push(pair("signedUploadTimestamp", &uploaded_at.to_string()));
            }
            Self::SetContacted { user_id } => {
                fields.push(pair("userId", user_id.as_str()));
                fields.push(pair("contacted", "TRUE"));
            }
            Self::SendPayment {
                user_id,
                user_folder_id,
                fields: extra,
                attachment,
            } => {
                // Free-form payment fields go first, as the form lays them out.
                fields.extend(extra.iter().cloned());
                fields.push(pair("userId", user_id.as_str()));
                fields.push(pair("userFolderId", user_folder_id));
                if let Some(attachment) = attachment {
                    fields.push(pair("attachment", &attachment.base64));
                    fields.push(pair("attachmentName", &attachment.name));
                }
            }
        }
        fields
    }
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_owned(), value.to_owned())
}

fn to_json(answers: &[QuestionAnswer]) -> String {
    serde_json::to_string(answers).unwrap_or_else(|_| "[]".to_owned())
}

/// Response body of the action endpoint.
///
/// Parsed leniently: any of the fields may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActionResponse {
    pub success: Option<bool>,
    pub error: Option<String>,
    pub details: Option<String>,
}

impl ActionResponse {
    /// Message to surface when the remote reported failure, `None` otherwise.
    ///
    /// An `error` field always means failure. `success: false` means failure
    /// with `details` as the message when present.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return Some(error.to_owned());
        }
        if self.success == Some(false) {
            return Some(
                self.details
                    .clone()
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| "request failed".to_owned()),
            );
        }
        None
    }
}
