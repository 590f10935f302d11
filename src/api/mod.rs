//! Backend API abstraction.
//!
//! `WorkerApi` is the seam between the dashboard and the network: the
//! console uses [`HttpApi`], tests can substitute an in-process stub.

pub mod http;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{
    AuthUser, CreatedWorker, Screenshot, Task, TaskSummary, TokenPair, Worker, WorkerSummary,
};

pub use http::HttpApi;

/// Every backend operation the console consumes.
#[async_trait]
pub trait WorkerApi: Send + Sync {
    // ── Workers ─────────────────────────────────────────────────────

    async fn list_workers(&self) -> Result<Vec<WorkerSummary>, ApiError>;

    async fn get_worker(&self, id: i64) -> Result<Worker, ApiError>;

    async fn create_worker(&self, name: &str) -> Result<CreatedWorker, ApiError>;

    async fn delete_worker(&self, id: i64, force: bool) -> Result<(), ApiError>;

    async fn stop_worker(&self, id: i64, force: bool) -> Result<WorkerSummary, ApiError>;

    async fn start_worker(&self, id: i64) -> Result<WorkerSummary, ApiError>;

    // ── Tasks ───────────────────────────────────────────────────────

    async fn worker_tasks(&self, worker_id: i64) -> Result<Vec<TaskSummary>, ApiError>;

    async fn create_task(&self, worker_id: i64, prompt: &str) -> Result<Task, ApiError>;

    async fn get_task(&self, task_id: i64) -> Result<Task, ApiError>;

    async fn delete_task(&self, task_id: i64) -> Result<(), ApiError>;

    // ── Screenshots ─────────────────────────────────────────────────

    /// Capture a fresh screenshot. The backend allows one per 30 seconds.
    async fn capture_screenshot(&self, worker_id: i64) -> Result<Screenshot, ApiError>;

    /// Stored screenshots, newest first.
    async fn screenshots(&self, worker_id: i64) -> Result<Vec<Screenshot>, ApiError>;

    // ── User ────────────────────────────────────────────────────────

    async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError>;

    async fn register(&self, email: &str, password: &str) -> Result<TokenPair, ApiError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;

    /// Revoke `access_token` server-side. The token is passed explicitly
    /// because the local session may already be cleared.
    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;

    async fn me(&self) -> Result<AuthUser, ApiError>;

    /// Returns the server's confirmation message.
    async fn change_password(&self, current: &str, new: &str) -> Result<String, ApiError>;
}

/// Fetch every worker with full detail.
///
/// The fleet is capped at three workers, so one detail request per summary
/// is fine.
pub async fn fetch_all_workers(api: &dyn WorkerApi) -> Result<Vec<Worker>, ApiError> {
    let summaries = api.list_workers().await?;
    if summaries.is_empty() {
        return Ok(Vec::new());
    }
    let details = futures::future::join_all(summaries.iter().map(|s| api.get_worker(s.id))).await;
    details.into_iter().collect()
}
