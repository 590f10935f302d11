//! Error types for the Worker Factory console.

use std::time::Duration;

/// Top-level error type for the console.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Action(#[from] ActionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors returned by the backend HTTP API.
///
/// `Display` yields the human-readable message shown to the operator: the
/// server's `detail` string when one was sent, otherwise `HTTP <code>`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Invalid base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ApiError {
    /// Build the normalized error for a non-success response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = detail_message(body).unwrap_or_else(|| format!("HTTP {status}"));
        if status == 401 {
            ApiError::Unauthorized { message }
        } else {
            ApiError::Status { status, message }
        }
    }

    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

/// Extract a `detail` string from a JSON error body.
fn detail_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Session (token storage) errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error on session file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt session file {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Errors from operator-initiated dashboard actions.
///
/// These are surfaced next to the command that triggered them and are never
/// retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Select a worker first")]
    NoWorkerSelected,

    #[error("Worker {id} not found")]
    WorkerNotFound { id: i64 },

    #[error("Worker name must not be empty")]
    EmptyName,

    #[error("Task prompt must not be empty")]
    EmptyPrompt,

    #[error("Worker limit reached ({max} workers)")]
    WorkerLimitReached { max: usize },

    #[error("Worker {name} is {status}, tasks can only be sent to an IDLE worker")]
    WorkerNotIdle { name: String, status: String },

    #[error("Worker {name} is {status}, capture needs an IDLE or BUSY worker")]
    CaptureNotAllowed { name: String, status: String },

    #[error("Capture cooling down, {}s left", .remaining.as_secs().max(1))]
    CaptureCoolingDown { remaining: Duration },

    #[error("Unknown skill '{id}'")]
    UnknownSkill { id: String },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("{0}")]
    Api(#[from] ApiError),
}

/// Result type alias for the console.
pub type Result<T> = std::result::Result<T, Error>;
