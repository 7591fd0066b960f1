//! Resilient access to the remote record source.
//!
//! # Architecture
//!
//! - One GET endpoint per entity kind, each returning the whole collection as
//!   a JSON array (no filtering, no pagination)
//! - One POST endpoint accepting form-encoded action commands
//! - GETs retry with attempt-scaled backoff (see [`RetryPolicy`]); POSTs are
//!   attempted once since actions are not idempotent
//! - No caching here; snapshots belong to the synchronization engine

mod retry;

pub use retry::{RetryPolicy, with_retry};

use std::sync::Arc;

use reqwest::StatusCode;
use seatsync_core::{
    ActionResponse, AdminRecord, EntityKind, RemoteAction, TicketRecord, UserRecord,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{ClientConfig, EndpointConfig};

/// Errors that can occur when fetching a collection.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("{kind} endpoint returned HTTP {status}")]
    Status { kind: EntityKind, status: u16 },

    /// Body was not the expected JSON array.
    #[error("{kind} endpoint returned unparseable body: {source}")]
    Parse {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },

    /// Well-formed response carrying an application-level error.
    #[error("{kind} endpoint reported an error: {message}")]
    Remote { kind: EntityKind, message: String },

    /// Retry budget spent.
    #[error("{kind} fetch failed after {attempts} attempts: {last}")]
    Exhausted {
        kind: EntityKind,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. } | Self::Parse { .. })
    }
}

/// Errors that can occur when posting an action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status without an error payload.
    #[error("action endpoint returned HTTP {0}")]
    Status(u16),

    /// The remote rejected the action.
    #[error("{0}")]
    Remote(String),

    /// Input rejected before anything was sent.
    #[error("{0}")]
    Validation(String),
}

/// Client for the remote record source.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct RemoteClient {
    inner: Arc<RemoteClientInner>,
}

struct RemoteClientInner {
    client: reqwest::Client,
    endpoints: EndpointConfig,
    retry: RetryPolicy,
}

/// Body shape used to tell an error object apart from a collection.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum CollectionBody<T> {
    Rows(Vec<T>),
    Error {
        error: Option<String>,
        details: Option<String>,
    },
}

impl RemoteClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RemoteClientInner {
                client,
                endpoints: config.endpoints.clone(),
                retry: config.retry,
            }),
        })
    }

    /// The retry budget applied to GETs.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// Fetch the whole user collection.
    ///
    /// # Errors
    ///
    /// See [`RemoteClient::fetch_collection`].
    pub async fn fetch_users(&self) -> Result<Vec<UserRecord>, FetchError> {
        self.fetch_collection(EntityKind::User).await
    }

    /// Fetch the whole ticket collection.
    ///
    /// # Errors
    ///
    /// See [`RemoteClient::fetch_collection`].
    pub async fn fetch_tickets(&self) -> Result<Vec<TicketRecord>, FetchError> {
        self.fetch_collection(EntityKind::Ticket).await
    }

    /// Fetch the administrator roster.
    ///
    /// # Errors
    ///
    /// See [`RemoteClient::fetch_collection`].
    pub async fn fetch_admins(&self) -> Result<Vec<AdminRecord>, FetchError> {
        self.fetch_collection(EntityKind::Admin).await
    }

    /// Fetch one collection with bounded retry.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Remote` immediately when the endpoint answers with
    /// an error object, and `FetchError::Exhausted` once transport, status or
    /// parse failures have used up the retry budget.
    #[instrument(skip(self))]
    pub async fn fetch_collection<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<T>, FetchError> {
        let url = self.endpoint(kind);
        with_retry(&self.inner.retry, kind, move |attempt| {
            debug!(attempt, "Fetching collection");
            self.get_once(kind, url)
        })
        .await
    }

    /// One GET, no retry.
    async fn get_once<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        url: &Url,
    ) -> Result<Vec<T>, FetchError> {
        let response = self.inner.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                kind,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        match serde_json::from_slice::<CollectionBody<T>>(&body) {
            Ok(CollectionBody::Rows(rows)) => {
                debug!(rows = rows.len(), "Fetched collection");
                Ok(rows)
            }
            Ok(CollectionBody::Error { error, details }) => Err(FetchError::Remote {
                kind,
                message: error
                    .or(details)
                    .unwrap_or_else(|| "unexpected object in place of collection".to_owned()),
            }),
            Err(source) => Err(FetchError::Parse { kind, source }),
        }
    }

    /// Post an action and interpret the response payload.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Remote` when the remote reports failure (either
    /// in the body or with an error status carrying a message),
    /// `ActionError::Status` for bare error statuses, and `ActionError::Http`
    /// for transport failures.
    #[instrument(skip(self, action), fields(action = action.name()))]
    pub async fn post_action(&self, action: &RemoteAction) -> Result<ActionResponse, ActionError> {
        let (status, body) = self.send_action(action).await?;
        let parsed = serde_json::from_str::<ActionResponse>(&body).ok();

        if let Some(message) = parsed.as_ref().and_then(ActionResponse::failure_message) {
            return Err(ActionError::Remote(message));
        }
        if !status.is_success() {
            return Err(ActionError::Status(status.as_u16()));
        }

        // A success status with a non-JSON body is a plain acknowledgement.
        Ok(parsed.unwrap_or_default())
    }

    /// Post an action and report completion only.
    ///
    /// Any HTTP response counts as delivered; only transport failures are
    /// errors. Used where the remote finishes its side effects asynchronously
    /// and the response content carries no meaning for the caller.
    ///
    /// # Errors
    ///
    /// Returns `ActionError::Http` if the request could not be delivered.
    #[instrument(skip(self, action), fields(action = action.name()))]
    pub async fn dispatch_action(&self, action: &RemoteAction) -> Result<(), ActionError> {
        let (status, _) = self.send_action(action).await?;
        debug!(status = status.as_u16(), "Action delivered");
        Ok(())
    }

    async fn send_action(&self, action: &RemoteAction) -> Result<(StatusCode, String), ActionError> {
        let response = self
            .inner
            .client
            .post(self.inner.endpoints.action.clone())
            .form(&action.form_fields())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    fn endpoint(&self, kind: EntityKind) -> &Url {
        match kind {
            EntityKind::User => &self.inner.endpoints.user,
            EntityKind::Ticket => &self.inner.endpoints.ticket,
            EntityKind::Admin => &self.inner.endpoints.admin,
        }
    }
}
