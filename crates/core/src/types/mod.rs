//! Core types for seatsync.
//!
//! This module provides type-safe wrappers for the records mirrored from the
//! remote spreadsheet-backed store.

pub mod action;
pub mod admin;
pub mod cell;
pub mod entity;
pub mod id;
pub mod serial_date;
pub mod status;
pub mod ticket;
pub mod user;

pub use action::{ActionResponse, Attachment, PaymentDetails, QuestionAnswer, RemoteAction};
pub use admin::AdminRecord;
pub use entity::EntityKind;
pub use id::*;
pub use serial_date::excel_serial;
pub use status::*;
pub use ticket::TicketRecord;
pub use user::UserRecord;
