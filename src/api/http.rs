//! reqwest-backed implementation of [`WorkerApi`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::WorkerApi;
use crate::config::{API_PREFIX, ConsoleConfig};
use crate::error::ApiError;
use crate::model::{
    AuthUser, CreatedWorker, Credentials, DetailResponse, NewTask, NewWorker, PasswordChange,
    RefreshRequest, Screenshot, Task, TaskSummary, TokenPair, Worker, WorkerSummary,
};
use crate::session::SessionStore;

/// HTTP client for the Worker Factory backend.
///
/// Every request carries `Authorization: Bearer <access token>` when the
/// injected session store holds one.
pub struct HttpApi {
    base: String,
    client: reqwest::Client,
    session: Arc<dyn SessionStore>,
}

impl HttpApi {
    /// `base_url` is the backend origin, e.g. `http://127.0.0.1:8000`.
    pub fn new(
        base_url: &str,
        session: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base = base_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                reason: "expected an http:// or https:// origin".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            base: format!("{base}{API_PREFIX}"),
            client,
            session,
        })
    }

    pub fn from_config(
        config: &ConsoleConfig,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, ApiError> {
        Self::new(&config.base_url, session, config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.session.access_token() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send and map non-2xx responses to a normalized [`ApiError`].
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "Backend returned an error");
        Err(ApiError::from_response(status.as_u16(), &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.send(self.request(Method::GET, path)).await?;
        decode(resp).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let resp = self.send(self.request(Method::POST, path).json(body)).await?;
        decode(resp).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.send(self.request(Method::POST, path)).await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl WorkerApi for HttpApi {
    async fn list_workers(&self) -> Result<Vec<WorkerSummary>, ApiError> {
        self.get_json("/workers/").await
    }

    async fn get_worker(&self, id: i64) -> Result<Worker, ApiError> {
        self.get_json(&format!("/workers/{id}")).await
    }

    async fn create_worker(&self, name: &str) -> Result<CreatedWorker, ApiError> {
        self.post_json("/workers/", &NewWorker { name }).await
    }

    async fn delete_worker(&self, id: i64, force: bool) -> Result<(), ApiError> {
        let path = format!("/workers/{id}?force={force}");
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn stop_worker(&self, id: i64, force: bool) -> Result<WorkerSummary, ApiError> {
        self.post_empty(&format!("/workers/{id}/stop?force={force}"))
            .await
    }

    async fn start_worker(&self, id: i64) -> Result<WorkerSummary, ApiError> {
        self.post_empty(&format!("/workers/{id}/start")).await
    }

    async fn worker_tasks(&self, worker_id: i64) -> Result<Vec<TaskSummary>, ApiError> {
        self.get_json(&format!("/workers/{worker_id}/tasks")).await
    }

    async fn create_task(&self, worker_id: i64, prompt: &str) -> Result<Task, ApiError> {
        self.post_json(&format!("/workers/{worker_id}/tasks"), &NewTask { prompt })
            .await
    }

    async fn get_task(&self, task_id: i64) -> Result<Task, ApiError> {
        self.get_json(&format!("/tasks/{task_id}")).await
    }

    async fn delete_task(&self, task_id: i64) -> Result<(), ApiError> {
        let path = format!("/tasks/{task_id}");
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn capture_screenshot(&self, worker_id: i64) -> Result<Screenshot, ApiError> {
        self.get_json(&format!("/workers/{worker_id}/screenshot"))
            .await
    }

    async fn screenshots(&self, worker_id: i64) -> Result<Vec<Screenshot>, ApiError> {
        self.get_json(&format!("/workers/{worker_id}/screenshots"))
            .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        self.post_json("/user/login", &Credentials { email, password })
            .await
    }

    async fn register(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        self.post_json("/user/register", &Credentials { email, password })
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.post_json("/user/refresh", &RefreshRequest { refresh_token })
            .await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        let request = self
            .client
            .request(Method::POST, self.url("/user/logout"))
            .bearer_auth(access_token);
        self.send(request).await?;
        Ok(())
    }

    async fn me(&self) -> Result<AuthUser, ApiError> {
        self.get_json("/user/me").await
    }

    async fn change_password(&self, current: &str, new: &str) -> Result<String, ApiError> {
        let body = PasswordChange {
            current_password: current,
            new_password: new,
        };
        let resp: DetailResponse = self.post_json("/user/password-change", &body).await?;
        Ok(resp.detail)
    }
}
