//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SEATSYNC_USER_ENDPOINT` - URL returning the user sheet as a JSON array
//! - `SEATSYNC_TICKET_ENDPOINT` - URL returning the ticket sheet as a JSON array
//! - `SEATSYNC_ADMIN_ENDPOINT` - URL returning the administrator sheet as a JSON array
//! - `SEATSYNC_ACTION_ENDPOINT` - URL accepting form-encoded action commands
//!
//! ## Optional
//! - `SEATSYNC_STORAGE_DIR` - Directory for durable snapshots (default: .seatsync)
//! - `SEATSYNC_POLL_INTERVAL_SECS` - Recurring poll period (default: 60)
//! - `SEATSYNC_WARMUP_STAGE_DELAY_SECS` - Pause between warm-up stages (default: 120)
//! - `SEATSYNC_FETCH_MAX_ATTEMPTS` - Attempts per fetch before giving up (default: 3)
//! - `SEATSYNC_FETCH_BASE_DELAY_MS` - Backoff unit between attempts (default: 1000)
//! - `SEATSYNC_ACTION_SETTLE_SECS` - Wait after an action before reporting success (default: 10)
//! - `SEATSYNC_REQUEST_TIMEOUT_SECS` - Per-request transport timeout (default: 30)
//! - `SEATSYNC_SESSION_IDLE_SECS` - Expire session-scoped entries after this much idle time
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::remote::RetryPolicy;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_WARMUP_STAGE_DELAY_SECS: u64 = 120;
const DEFAULT_ACTION_SETTLE_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote record source endpoints
    pub endpoints: EndpointConfig,
    /// Directory holding durable snapshots
    pub storage_dir: PathBuf,
    /// Retry budget for collection fetches
    pub retry: RetryPolicy,
    /// Warm-up, poll and settle timings
    pub schedule: ScheduleConfig,
    /// Transport-level timeout for a single request
    pub request_timeout: Duration,
    /// Idle expiry for session-scoped entries (`None` = lives until logout)
    pub session_idle: Option<Duration>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// One URL per entity kind plus the action endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub user: Url,
    pub ticket: Url,
    pub admin: Url,
    pub action: Url,
}

/// Timings driving the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Period of the recurring poll.
    pub poll_interval: Duration,
    /// Pause before each warm-up stage after the first.
    pub warmup_stage_delay: Duration,
    /// Wait after an action completes before the UI claims success.
    pub action_settle: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            warmup_stage_delay: Duration::from_secs(DEFAULT_WARMUP_STAGE_DELAY_SECS),
            action_settle: Duration::from_secs(DEFAULT_ACTION_SETTLE_SECS),
        }
    }
}

impl ClientConfig {
    /// Configuration with default timings for the given endpoints.
    #[must_use]
    pub fn new(endpoints: EndpointConfig, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            endpoints,
            storage_dir: storage_dir.into(),
            retry: RetryPolicy::default(),
            schedule: ScheduleConfig::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            session_idle: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let endpoints = EndpointConfig::from_env()?;
        let storage_dir = PathBuf::from(get_env_or_default("SEATSYNC_STORAGE_DIR", ".seatsync"));

        let retry = RetryPolicy {
            max_attempts: get_positive("SEATSYNC_FETCH_MAX_ATTEMPTS", 3)?,
            base_delay: Duration::from_millis(get_positive("SEATSYNC_FETCH_BASE_DELAY_MS", 1000)?),
        };

        let schedule = ScheduleConfig {
            poll_interval: Duration::from_secs(get_positive(
                "SEATSYNC_POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            warmup_stage_delay: Duration::from_secs(get_positive(
                "SEATSYNC_WARMUP_STAGE_DELAY_SECS",
                DEFAULT_WARMUP_STAGE_DELAY_SECS,
            )?),
            action_settle: Duration::from_secs(get_u64(
                "SEATSYNC_ACTION_SETTLE_SECS",
                DEFAULT_ACTION_SETTLE_SECS,
            )?),
        };

        let request_timeout = Duration::from_secs(get_positive(
            "SEATSYNC_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);

        let session_idle = match get_optional_env("SEATSYNC_SESSION_IDLE_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_positive(
                "SEATSYNC_SESSION_IDLE_SECS",
                &raw,
            )?)),
            None => None,
        };

        Ok(Self {
            endpoints,
            storage_dir,
            retry,
            schedule,
            request_timeout,
            session_idle,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl EndpointConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            user: get_required_url("SEATSYNC_USER_ENDPOINT")?,
            ticket: get_required_url("SEATSYNC_TICKET_ENDPOINT")?,
            admin: get_required_url("SEATSYNC_ADMIN_ENDPOINT")?,
            action: get_required_url("SEATSYNC_ACTION_ENDPOINT")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable parsed as an absolute URL.
fn get_required_url(key: &str) -> Result<Url, ConfigError> {
    let raw = get_required_env(key)?;
    parse_url(key, &raw)
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a numeric environment variable, allowing zero.
fn get_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Get a numeric environment variable that must be at least 1.
fn get_positive<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: TryFrom<u64>,
{
    let value = match get_optional_env(key) {
        Some(raw) => parse_positive(key, &raw)?,
        None => return Ok(default),
    };
    T::try_from(value).map_err(|_| ConfigError::InvalidEnvVar(key.to_string(), "out of range".to_string()))
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if value == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn endpoints() -> EndpointConfig {
        EndpointConfig {
            user: Url::parse("https://example.test/exec?sheetname=user").unwrap(),
            ticket: Url::parse("https://example.test/exec?sheetname=ticket").unwrap(),
            admin: Url::parse("https://example.test/exec?sheetname=admin").unwrap(),
            action: Url::parse("https://example.test/exec").unwrap(),
        }
    }

    #[test]
    fn test_new_uses_default_timings() {
        let config = ClientConfig::new(endpoints(), "/tmp/seatsync");
        assert_eq!(config.schedule.poll_interval, Duration::from_secs(60));
        assert_eq!(config.schedule.warmup_stage_delay, Duration::from_secs(120));
        assert_eq!(config.schedule.action_settle, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
        assert!(config.session_idle.is_none());
    }

    #[test]
    fn test_parse_positive_rejects_zero() {
        let result = parse_positive("SEATSYNC_POLL_INTERVAL_SECS", "0");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_parse_positive_rejects_garbage() {
        assert!(parse_positive("SEATSYNC_POLL_INTERVAL_SECS", "soon").is_err());
        assert_eq!(parse_positive("SEATSYNC_POLL_INTERVAL_SECS", " 30 ").unwrap(), 30);
    }

    #[test]
    fn test_parse_url_requires_http_scheme() {
        assert!(parse_url("SEATSYNC_USER_ENDPOINT", "ftp://example.test/users").is_err());
        assert!(parse_url("SEATSYNC_USER_ENDPOINT", "not a url").is_err());
        assert!(parse_url("SEATSYNC_USER_ENDPOINT", "http://127.0.0.1:8080/users").is_ok());
    }
}
