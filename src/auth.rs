//! Operator authentication: session restore, login/register, logout,
//! token rotation and password change.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::api::WorkerApi;
use crate::error::{ActionError, ApiError};
use crate::model::AuthUser;
use crate::session::{Session, SessionStore};

/// Tracks who is logged in and keeps the session store in step with it.
pub struct AuthManager {
    api: Arc<dyn WorkerApi>,
    session: Arc<dyn SessionStore>,
    user: RwLock<Option<AuthUser>>,
}

impl AuthManager {
    pub fn new(api: Arc<dyn WorkerApi>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            api,
            session,
            user: RwLock::new(None),
        }
    }

    /// Restore a previous session once at startup.
    ///
    /// An invalid or expired token is not an error: the stored tokens are
    /// dropped and the console starts logged out.
    pub async fn restore(&self) -> Option<AuthUser> {
        if self.session.get().is_none() {
            debug!("No stored session");
            return None;
        }
        match self.api.me().await {
            Ok(user) => {
                info!(user = %user.email, "Session restored");
                *self.user.write().await = Some(user.clone());
                Some(user)
            }
            Err(e) => {
                debug!(error = %e, "Stored session rejected, clearing tokens");
                self.forget_tokens();
                None
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser, ActionError> {
        let tokens = self.api.login(email, password).await?;
        self.store_tokens(Session::from(tokens));
        self.load_user().await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<AuthUser, ActionError> {
        if password != confirm {
            return Err(ActionError::PasswordMismatch);
        }
        let tokens = self.api.register(email, password).await?;
        self.store_tokens(Session::from(tokens));
        self.load_user().await
    }

    /// Revoke server-side refresh tokens (best effort) and clear locally.
    pub async fn logout(&self) {
        // Capture the token before the session is cleared below.
        if let Some(token) = self.session.access_token() {
            let api = Arc::clone(&self.api);
            tokio::spawn(async move {
                if let Err(e) = api.logout(token.expose_secret()).await {
                    debug!(error = %e, "Server-side logout failed");
                }
            });
        }
        self.forget_tokens();
        *self.user.write().await = None;
        info!("Logged out");
    }

    pub async fn change_password(&self, current: &str, new: &str) -> Result<String, ActionError> {
        if self.session.get().is_none() {
            return Err(ActionError::NotLoggedIn);
        }
        Ok(self.api.change_password(current, new).await?)
    }

    /// Exchange the stored refresh token for a rotated pair.
    pub async fn refresh(&self) -> Result<(), ActionError> {
        let session = self.session.get().ok_or(ActionError::NotLoggedIn)?;
        match self
            .api
            .refresh(session.refresh_token.expose_secret())
            .await
        {
            Ok(tokens) => {
                self.store_tokens(Session::from(tokens));
                debug!("Tokens rotated");
                Ok(())
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.forget_tokens();
                    *self.user.write().await = None;
                }
                Err(e.into())
            }
        }
    }

    pub async fn current_user(&self) -> Option<AuthUser> {
        self.user.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.user.read().await.is_some()
    }

    async fn load_user(&self) -> Result<AuthUser, ActionError> {
        let user = self.api.me().await.map_err(|e: ApiError| {
            self.forget_tokens();
            e
        })?;
        info!(user = %user.email, "Logged in");
        *self.user.write().await = Some(user.clone());
        Ok(user)
    }

    fn store_tokens(&self, session: Session) {
        if let Err(e) = self.session.set(session) {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn forget_tokens(&self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session");
        }
    }
}
