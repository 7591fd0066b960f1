//! Seatsync Core - Shared record types.
//!
//! This crate provides the types exchanged with the remote record source and
//! cached locally by the client:
//! - `client` - Synchronization engine, snapshot store, identity resolution
//! - `cli` - Host process driving a client session from the terminal
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no storage,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed ids, records, workflow statuses, approval stamps, and
//!   remote action commands

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
