//! In-process backend stub shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::SecretString;

use crate::api::WorkerApi;
use crate::error::ApiError;
use crate::model::{
    AuthUser, CreatedWorker, Screenshot, Task, TaskStatus, TaskSummary, TokenPair, Worker,
    WorkerStatus, WorkerSummary,
};

#[derive(Default)]
struct StubState {
    workers: Vec<Worker>,
    tasks: HashMap<i64, Task>,
    screenshots: HashMap<i64, Vec<Screenshot>>,
    failures: HashMap<&'static str, ApiError>,
    delays: HashMap<&'static str, Duration>,
    calls: HashMap<&'static str, usize>,
    revoked: Vec<String>,
    next_id: i64,
}

/// Backend stand-in with call counting and per-operation failure injection.
pub(crate) struct StubApi {
    state: Mutex<StubState>,
}

pub(crate) fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, minute, 0).unwrap()
}

pub(crate) fn worker(id: i64, name: &str, status: WorkerStatus) -> Worker {
    Worker {
        id,
        name: name.to_string(),
        status,
        container_id: None,
        vnc_port: None,
        created_at: Some(ts(0)),
        tasks: Vec::new(),
    }
}

pub(crate) fn task(id: i64, worker_id: i64, prompt: &str, minute: u32) -> Task {
    Task {
        id,
        worker_id,
        status: TaskStatus::Completed,
        prompt: prompt.to_string(),
        result: Some(format!("result of {prompt}")),
        logs: Some(format!("step 1\n\nstep 2 for {prompt}\n")),
        created_at: ts(minute),
        finished_at: Some(ts(minute + 1)),
    }
}

impl StubApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState {
                next_id: 100,
                ..StubState::default()
            }),
        }
    }

    pub fn with_workers(workers: Vec<Worker>) -> Self {
        let stub = Self::new();
        stub.state.lock().unwrap().workers = workers;
        stub
    }

    /// Register a full task and its summary on the owning worker.
    pub fn add_task(&self, task: Task) {
        let mut state = self.state.lock().unwrap();
        if let Some(w) = state.workers.iter_mut().find(|w| w.id == task.worker_id) {
            w.tasks.push(TaskSummary {
                id: task.id,
                prompt: task.prompt.clone(),
                status: task.status,
                created_at: task.created_at,
            });
        }
        state.tasks.insert(task.id, task);
    }

    pub fn add_screenshot(&self, worker_id: i64, id: i64, minute: u32) {
        let mut state = self.state.lock().unwrap();
        state
            .screenshots
            .entry(worker_id)
            .or_default()
            .insert(0, screenshot(worker_id, id, minute));
    }

    pub fn set_status(&self, worker_id: i64, status: WorkerStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(w) = state.workers.iter_mut().find(|w| w.id == worker_id) {
            w.status = status;
        }
    }

    pub fn fail(&self, op: &'static str, err: ApiError) {
        self.state.lock().unwrap().failures.insert(op, err);
    }

    pub fn recover(&self, op: &'static str) {
        self.state.lock().unwrap().failures.remove(op);
    }

    pub fn delay(&self, op: &'static str, by: Duration) {
        self.state.lock().unwrap().delays.insert(op, by);
    }

    pub fn calls(&self, op: &'static str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    /// Access tokens passed to `logout`, in call order.
    pub fn revoked_tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().revoked.clone()
    }

    async fn enter(&self, op: &'static str) -> Result<(), ApiError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            *state.calls.entry(op).or_default() += 1;
            state.delays.get(op).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.state.lock().unwrap().failures.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn not_found(what: &str) -> ApiError {
        ApiError::Status {
            status: 404,
            message: format!("{what} not found"),
        }
    }
}

fn screenshot(worker_id: i64, id: i64, minute: u32) -> Screenshot {
    Screenshot {
        id,
        worker_id,
        s3_url: format!("https://s3.example/{worker_id}/{id}.png"),
        created_at: ts(minute),
    }
}

fn tokens() -> TokenPair {
    TokenPair {
        access_token: SecretString::from("access-token".to_string()),
        refresh_token: SecretString::from("refresh-token".to_string()),
    }
}

fn summary(w: &Worker) -> WorkerSummary {
    WorkerSummary {
        id: w.id,
        name: w.name.clone(),
        status: w.status,
        container_id: w.container_id.clone(),
    }
}

#[async_trait]
impl WorkerApi for StubApi {
    async fn list_workers(&self) -> Result<Vec<WorkerSummary>, ApiError> {
        self.enter("list_workers").await?;
        Ok(self.state.lock().unwrap().workers.iter().map(summary).collect())
    }

    async fn get_worker(&self, id: i64) -> Result<Worker, ApiError> {
        self.enter("get_worker").await?;
        let state = self.state.lock().unwrap();
        state
            .workers
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found("Worker"))
    }

    async fn create_worker(&self, name: &str) -> Result<CreatedWorker, ApiError> {
        self.enter("create_worker").await?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = worker(state.next_id, name, WorkerStatus::Starting);
        state.workers.push(created.clone());
        Ok(CreatedWorker {
            vnc_password: Some(SecretString::from(format!("pw-{}", created.id))),
            worker: created,
        })
    }

    async fn delete_worker(&self, id: i64, _force: bool) -> Result<(), ApiError> {
        self.enter("delete_worker").await?;
        let mut state = self.state.lock().unwrap();
        let before = state.workers.len();
        state.workers.retain(|w| w.id != id);
        if state.workers.len() == before {
            return Err(Self::not_found("Worker"));
        }
        Ok(())
    }

    async fn stop_worker(&self, id: i64, _force: bool) -> Result<WorkerSummary, ApiError> {
        self.enter("stop_worker").await?;
        let mut state = self.state.lock().unwrap();
        let w = state
            .workers
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Self::not_found("Worker"))?;
        w.status = WorkerStatus::Offline;
        Ok(summary(w))
    }

    async fn start_worker(&self, id: i64) -> Result<WorkerSummary, ApiError> {
        self.enter("start_worker").await?;
        let mut state = self.state.lock().unwrap();
        let w = state
            .workers
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Self::not_found("Worker"))?;
        w.status = WorkerStatus::Starting;
        Ok(summary(w))
    }

    async fn worker_tasks(&self, worker_id: i64) -> Result<Vec<TaskSummary>, ApiError> {
        self.enter("worker_tasks").await?;
        let state = self.state.lock().unwrap();
        state
            .workers
            .iter()
            .find(|w| w.id == worker_id)
            .map(|w| w.tasks.clone())
            .ok_or_else(|| Self::not_found("Worker"))
    }

    async fn create_task(&self, worker_id: i64, prompt: &str) -> Result<Task, ApiError> {
        self.enter("create_task").await?;
        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            state.next_id
        };
        let mut created = task(id, worker_id, prompt, 30);
        created.status = TaskStatus::Queued;
        created.result = None;
        created.logs = None;
        created.finished_at = None;
        self.add_task(created.clone());
        Ok(created)
    }

    async fn get_task(&self, task_id: i64) -> Result<Task, ApiError> {
        self.enter("get_task").await?;
        let state = self.state.lock().unwrap();
        state
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| Self::not_found("Task"))
    }

    async fn delete_task(&self, task_id: i64) -> Result<(), ApiError> {
        self.enter("delete_task").await?;
        let mut state = self.state.lock().unwrap();
        state
            .tasks
            .remove(&task_id)
            .ok_or_else(|| Self::not_found("Task"))?;
        for worker in &mut state.workers {
            worker.tasks.retain(|t| t.id != task_id);
        }
        Ok(())
    }

    async fn capture_screenshot(&self, worker_id: i64) -> Result<Screenshot, ApiError> {
        self.enter("capture_screenshot").await?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let shot = screenshot(worker_id, state.next_id, 45);
        state
            .screenshots
            .entry(worker_id)
            .or_default()
            .insert(0, shot.clone());
        Ok(shot)
    }

    async fn screenshots(&self, worker_id: i64) -> Result<Vec<Screenshot>, ApiError> {
        self.enter("screenshots").await?;
        let state = self.state.lock().unwrap();
        Ok(state.screenshots.get(&worker_id).cloned().unwrap_or_default())
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<TokenPair, ApiError> {
        self.enter("login").await?;
        Ok(tokens())
    }

    async fn register(&self, _email: &str, _password: &str) -> Result<TokenPair, ApiError> {
        self.enter("register").await?;
        Ok(tokens())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.enter("refresh").await?;
        Ok(tokens())
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        self.state
            .lock()
            .unwrap()
            .revoked
            .push(access_token.to_string());
        self.enter("logout").await
    }

    async fn me(&self) -> Result<AuthUser, ApiError> {
        self.enter("me").await?;
        Ok(AuthUser {
            id: 1,
            email: "ops@example.com".to_string(),
            is_active: true,
        })
    }

    async fn change_password(&self, _current: &str, _new: &str) -> Result<String, ApiError> {
        self.enter("change_password").await?;
        Ok("Password successfully changed".to_string())
    }
}
