//! Integration tests for seatsync.
//!
//! Tests run the client against [`MockRemote`], an in-process axum server
//! that stands in for the spreadsheet-backed record source. Each sheet can be
//! scripted to fail, stall or return odd bodies, and every request is
//! recorded so tests can assert on attempt counts and timing.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p seatsync-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `remote_retry` - Backoff and error classification of the fetcher
//! - `sync_engine` - Snapshots, stale responses, identity fallback, cache recovery
//! - `admin_session` - Login, ownership filtering, session re-hydration
//! - `transfer_flow` - Ticket-transfer approval against the action endpoint
//! - `schedule` - Warm-up stages and poll ticks

#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{Form, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use seatsync_client::{ClientConfig, EndpointConfig, RetryPolicy, ScheduleConfig, SyncContext};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

/// Base unit for fetch backoff in tests.
pub const BASE_DELAY: Duration = Duration::from_millis(100);

/// Settle delay applied after actions in tests.
pub const SETTLE: Duration = Duration::from_millis(20);

/// One collection endpoint of the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sheet {
    Users,
    Tickets,
    Admins,
}

/// A one-shot scripted answer for the next request to a sheet.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Bare status with an empty body.
    Status(u16),
    /// 200 with this raw body.
    Body(String),
    /// 200 with this JSON, after a pause.
    Delayed(Duration, Value),
}

#[derive(Default)]
struct MockState {
    rows: Mutex<HashMap<Sheet, Value>>,
    script: Mutex<HashMap<Sheet, VecDeque<Reply>>>,
    hits: Mutex<Vec<(Sheet, Instant)>>,
    actions: Mutex<Vec<Vec<(String, String)>>>,
    action_reply: Mutex<Option<(u16, String)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process stand-in for the remote record source.
///
/// Sheets serve their current rows unless a scripted [`Reply`] is queued.
/// The server stops when the mock is dropped.
pub struct MockRemote {
    base: Url,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockRemote {
    /// Bind to an ephemeral port and start serving empty sheets.
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/users", get(|State(s): State<Arc<MockState>>| serve(s, Sheet::Users)))
            .route("/tickets", get(|State(s): State<Arc<MockState>>| serve(s, Sheet::Tickets)))
            .route("/admins", get(|State(s): State<Arc<MockState>>| serve(s, Sheet::Admins)))
            .route("/action", post(action))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock remote");
        let addr = listener.local_addr().expect("Failed to read mock address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let base = Url::parse(&format!("http://{addr}/")).expect("Failed to build mock URL");
        Self { base, state, server }
    }

    /// Client configuration pointing at this mock, with short test timings.
    #[must_use]
    pub fn config(&self, storage_dir: &Path) -> ClientConfig {
        let endpoint = |path: &str| self.base.join(path).expect("Failed to join mock URL");
        let mut config = ClientConfig::new(
            EndpointConfig {
                user: endpoint("users"),
                ticket: endpoint("tickets"),
                admin: endpoint("admins"),
                action: endpoint("action"),
            },
            storage_dir,
        );
        config.retry = RetryPolicy {
            max_attempts: 3,
            base_delay: BASE_DELAY,
        };
        config.schedule = ScheduleConfig {
            poll_interval: Duration::from_secs(60),
            warmup_stage_delay: Duration::from_secs(120),
            action_settle: SETTLE,
        };
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// A synchronization context on `storage_dir` talking to this mock.
    pub async fn context(&self, storage_dir: &Path) -> SyncContext {
        SyncContext::connect(&self.config(storage_dir))
            .await
            .expect("Failed to connect context")
    }

    /// Replace the rows a sheet serves.
    pub fn set_rows(&self, sheet: Sheet, rows: Value) {
        lock(&self.state.rows).insert(sheet, rows);
    }

    /// Queue a one-shot reply for the next request to `sheet`.
    pub fn script(&self, sheet: Sheet, reply: Reply) {
        lock(&self.state.script).entry(sheet).or_default().push_back(reply);
    }

    /// Answer every action with this status and body.
    pub fn set_action_reply(&self, status: u16, body: impl Into<String>) {
        *lock(&self.state.action_reply) = Some((status, body.into()));
    }

    /// Requests received by `sheet` so far.
    #[must_use]
    pub fn hits(&self, sheet: Sheet) -> usize {
        self.hit_times(sheet).len()
    }

    /// Arrival times of requests to `sheet`, oldest first.
    #[must_use]
    pub fn hit_times(&self, sheet: Sheet) -> Vec<Instant> {
        lock(&self.state.hits)
            .iter()
            .filter(|(s, _)| *s == sheet)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Form fields of every action received, oldest first.
    #[must_use]
    pub fn actions(&self) -> Vec<Vec<(String, String)>> {
        lock(&self.state.actions).clone()
    }
}

impl Drop for MockRemote {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn serve(state: Arc<MockState>, sheet: Sheet) -> Response {
    lock(&state.hits).push((sheet, Instant::now()));
    let next = lock(&state.script).get_mut(&sheet).and_then(VecDeque::pop_front);

    match next {
        Some(Reply::Status(code)) => status(code).into_response(),
        Some(Reply::Body(body)) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Some(Reply::Delayed(delay, rows)) => {
            tokio::time::sleep(delay).await;
            Json(rows).into_response()
        }
        None => {
            let rows = lock(&state.rows).get(&sheet).cloned().unwrap_or_else(|| json!([]));
            Json(rows).into_response()
        }
    }
}

async fn action(State(state): State<Arc<MockState>>, Form(fields): Form<Vec<(String, String)>>) -> Response {
    lock(&state.actions).push(fields);
    let reply = lock(&state.action_reply).clone();
    match reply {
        Some((code, body)) => (status(code), body).into_response(),
        None => Json(json!({ "success": true })).into_response(),
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Fresh storage directory under the system temp dir.
#[must_use]
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("seatsync-it-{}", uuid::Uuid::new_v4()))
}

/// Value of `key` in a recorded action.
#[must_use]
pub fn field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Fixture rows shared across tests.
pub mod fixtures {
    use serde_json::{Value, json};

    /// Two administrators.
    #[must_use]
    pub fn admins() -> Value {
        json!([
            { "username": "alice", "password": "wonderland", "senderName": "Alice", "senderEmail": "alice@example.test" },
            { "username": "bob", "password": "builder", "senderName": "Bob", "senderEmail": "bob@example.test" }
        ])
    }

    /// Users interleaved across both administrators. User ids arrive as
    /// numbers, the way the sheet exports them.
    #[must_use]
    pub fn users() -> Value {
        json!([
            {
                "userId": 1001, "admin": "alice", "fullName": "Ada Smith",
                "systemStatus": "WAITING APPROVAL", "ticketId": 501,
                "verificationCode": "4821"
            },
            { "userId": 1002, "admin": "bob", "fullName": "Ben Smith", "systemStatus": "WAITING APPROVAL" },
            { "userId": 1003, "admin": "alice", "fullName": "Cleo Jones", "systemStatus": "WAITING COMPLETION" },
            { "userId": 1004, "admin": "alice", "fullName": "Dan Smith", "systemStatus": "CANCELLED" }
        ])
    }

    /// Tickets for the users above.
    #[must_use]
    pub fn tickets() -> Value {
        json!([
            { "ticketId": 501, "ticketTitle": "Finals", "userId": 1001, "admin": "alice", "eventName": "Finals" },
            { "ticketId": 502, "ticketTitle": "Opener", "userId": 1002, "admin": "bob", "eventName": "Opener" },
            { "ticketId": 503, "ticketTitle": "Encore", "userId": 1003, "admin": "alice", "eventName": "Encore" }
        ])
    }
}
