//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default backend location.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// API prefix shared by every backend route.
pub const API_PREFIX: &str = "/routers/v1";

/// Console configuration.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Backend origin, without the API prefix.
    pub base_url: String,
    /// Interval between background refreshes.
    pub poll_interval: Duration,
    /// Where access/refresh tokens are persisted.
    pub session_file: PathBuf,
    /// Pass `force=true` when stopping a worker from the toggle action.
    pub force_stop: bool,
    /// Per-request timeout for backend calls.
    pub request_timeout: Duration,
    /// Directory for a daily rolling log file. Stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(10),
            session_file: default_session_file(),
            force_stop: false,
            request_timeout: Duration::from_secs(30),
            log_dir: None,
        }
    }
}

impl ConsoleConfig {
    /// Build config from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let base_url = var("WORKER_FACTORY_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let poll_secs = positive_secs(var("WORKER_FACTORY_POLL_SECS"), 10);

        let session_file = var("WORKER_FACTORY_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_file);

        let force_stop = var("WORKER_FACTORY_FORCE_STOP")
            .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let timeout_secs = positive_secs(var("WORKER_FACTORY_TIMEOUT_SECS"), 30);

        let log_dir = var("WORKER_FACTORY_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Self {
            base_url,
            poll_interval: Duration::from_secs(poll_secs),
            session_file,
            force_stop,
            request_timeout: Duration::from_secs(timeout_secs),
            log_dir,
        }
    }
}

/// Whole seconds greater than zero, else `default`.
fn positive_secs(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|s| s.trim().parse().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default)
}

impl ConsoleConfig {
    /// Reject values that would only fail later at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_FACTORY_URL".into(),
                message: format!("{} is not an http(s) origin", self.base_url),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_FACTORY_TIMEOUT_SECS".into(),
                message: "timeout must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

fn default_session_file() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".worker-factory/session.json")
}
