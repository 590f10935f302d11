//! Session store: where the access/refresh token pair lives between runs.
//!
//! The store is injected into the API client and the auth manager so that
//! nothing reads tokens from ambient global state. `FileSessionStore` is the
//! durable one the console uses; `MemorySessionStore` backs tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::model::TokenPair;

/// Stored credentials for the current operator.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl From<TokenPair> for Session {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

/// Get/set/clear access to the persisted session.
pub trait SessionStore: Send + Sync {
    /// Current session, if any tokens are stored.
    fn get(&self) -> Option<Session>;

    /// Replace the stored tokens.
    fn set(&self, session: Session) -> Result<(), SessionError>;

    /// Forget the stored tokens.
    fn clear(&self) -> Result<(), SessionError>;

    /// Access token only, for building request headers.
    fn access_token(&self) -> Option<SecretString> {
        self.get().map(|s| s.access_token)
    }
}

/// Process-local session store.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<Session> {
        self.inner.lock().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, session: Session) -> Result<(), SessionError> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(session);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
        Ok(())
    }
}

/// On-disk layout of the session file.
#[derive(Serialize, Deserialize)]
struct SessionFile {
    access_token: String,
    refresh_token: String,
}

/// JSON-file session store, cached in memory after the first load.
pub struct FileSessionStore {
    path: PathBuf,
    cache: Mutex<Option<Session>>,
}

impl FileSessionStore {
    /// Open the store at `path`, loading any existing session.
    ///
    /// A missing file means "logged out". A corrupt file is reported and
    /// treated the same way so a bad file never blocks startup.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cached = match load(&path) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session file");
                None
            }
        };
        Self {
            path,
            cache: Mutex::new(cached),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load(path: &Path) -> Result<Option<Session>, SessionError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SessionError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };
    let file: SessionFile = serde_json::from_str(&raw).map_err(|e| SessionError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(Session {
        access_token: SecretString::from(file.access_token),
        refresh_token: SecretString::from(file.refresh_token),
    }))
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<Session> {
        self.cache.lock().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, session: Session) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = SessionFile {
            access_token: session.access_token.expose_secret().to_string(),
            refresh_token: session.refresh_token.expose_secret().to_string(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| SessionError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(&self.path, json).map_err(io_err)?;
        debug!(path = %self.path.display(), "Session saved");

        if let Ok(mut guard) = self.cache.lock() {
            *guard = Some(session);
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        if let Ok(mut guard) = self.cache.lock() {
            *guard = None;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}
