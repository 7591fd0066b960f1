//! Seatsync Client - Synchronization and cache layer.
//!
//! Mirrors user, ticket and administrator records from a slow, rate-limited
//! remote record source and drives the ticket-transfer workflow from that
//! mirrored state.
//!
//! # Architecture
//!
//! ```text
//! IdentityResolver ──> SyncContext ──> RemoteClient ──> remote endpoints
//!                          │
//!                          └──> SnapshotStore (durable files + session cache)
//!
//! TransferPage ──> RemoteClient (ticketApproval)
//! ```
//!
//! # Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`remote`] - Resilient fetcher and action poster
//! - [`store`] - Local snapshot store
//! - [`sync`] - Synchronization context, warm-up and polling
//! - [`session`] - User and administrator identity
//! - [`transfer`] - Ticket-transfer approval state machine
//! - [`workflow`] - Navigation signals and their trigger conditions
//! - [`actions`] - Onboarding and administrator actions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod actions;
pub mod config;
pub mod error;
pub mod remote;
pub mod session;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod workflow;

pub use config::{ClientConfig, ConfigError, EndpointConfig, ScheduleConfig};
pub use error::ClientError;
pub use remote::{ActionError, FetchError, RemoteClient, RetryPolicy};
pub use session::{AuthError, IdentityResolver, Navigation, UserResolution};
pub use store::{SnapshotStore, StoreError, StoreKey};
pub use sync::{FetchMode, Refresh, SyncContext, SyncError, SyncHandle};
pub use transfer::{Mount, TransferError, TransferPage, TransferView};
pub use workflow::{RedirectReason, RouteSignal};
