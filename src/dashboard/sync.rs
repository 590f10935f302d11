//! Dashboard synchronizer. Keeps the fleet view fresh and runs operator
//! actions against the backend.
//!
//! All mutations are confirm-then-refresh; nothing is applied optimistically.
//! Background refresh failures keep the last-known workers and only record
//! a message. Start/stop/delete failures are swallowed because the next poll
//! reconciles the true state. Spawn, submit and capture errors go back to the
//! caller.
//!
//! Two guards make out-of-order completions harmless:
//! - every refresh takes a sequence number and an older result never
//!   replaces a newer one;
//! - per-selection loads (task output, last screenshot) capture the
//!   selection epoch before awaiting and are dropped if it moved.
//!
//! A refresh rejected with 401 also wakes [`Synchronizer::auth_lost`] so the
//! owner of the session can renew the token or end the session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cooldown::CaptureCooldown;
use super::log_view::{LogPanel, LogViewer};
use super::skills::Skill;
use super::state::{DashboardState, TaskOutput, can_capture, most_recent_task, validate_submit};
use crate::api::{WorkerApi, fetch_all_workers};
use crate::error::ActionError;
use crate::model::{MAX_WORKERS, Screenshot, Task, Worker, WorkerStatus};

/// Default rows of the output panel viewport.
const DEFAULT_LOG_ROWS: u32 = 20;

/// Which power request a toggle issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
}

/// Result of spawning a worker.
#[derive(Debug)]
pub struct SpawnedWorker {
    pub worker: Worker,
    /// Display password. Returned once here and never stored.
    pub display_password: Option<SecretString>,
}

/// Owner of the dashboard state.
pub struct Synchronizer {
    api: Arc<dyn WorkerApi>,
    state: RwLock<DashboardState>,
    log_view: Mutex<LogViewer>,
    cooldown: Mutex<CaptureCooldown>,
    /// Bumped on every selection change.
    selection_epoch: AtomicU64,
    /// Last issued refresh sequence number.
    refresh_issued: AtomicU64,
    /// Sequence number of the refresh whose workers are currently applied.
    refresh_applied: AtomicU64,
    force_stop: bool,
    auth_lost: Arc<Notify>,
}

impl Synchronizer {
    pub fn new(api: Arc<dyn WorkerApi>) -> Self {
        Self {
            api,
            state: RwLock::new(DashboardState::default()),
            log_view: Mutex::new(LogViewer::with_rows(DEFAULT_LOG_ROWS)),
            cooldown: Mutex::new(CaptureCooldown::default()),
            selection_epoch: AtomicU64::new(0),
            refresh_issued: AtomicU64::new(0),
            refresh_applied: AtomicU64::new(0),
            force_stop: false,
            auth_lost: Arc::new(Notify::new()),
        }
    }

    /// Pass `force=true` on stop requests issued by [`Self::toggle_worker`].
    pub fn with_force_stop(mut self, force: bool) -> Self {
        self.force_stop = force;
        self
    }

    pub fn with_log_rows(self, rows: u32) -> Self {
        if let Ok(mut view) = self.log_view.lock() {
            *view = LogViewer::with_rows(rows);
        }
        self
    }

    pub fn api(&self) -> &Arc<dyn WorkerApi> {
        &self.api
    }

    /// Notified when a refresh was rejected as unauthorized. A rejection
    /// with nobody waiting is kept until the next `notified()`.
    pub fn auth_lost(&self) -> Arc<Notify> {
        Arc::clone(&self.auth_lost)
    }

    /// Copy of the current state for rendering.
    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    pub async fn selected_worker(&self) -> Option<Worker> {
        self.state.read().await.selected_worker().cloned()
    }

    pub fn log_view(&self) -> LogViewer {
        self.log_view
            .lock()
            .map(|v| *v)
            .unwrap_or_else(|_| LogViewer::with_rows(DEFAULT_LOG_ROWS))
    }

    pub fn scroll_log(&self, rows: i64) {
        if let Ok(mut view) = self.log_view.lock() {
            view.scroll_rows(rows);
        }
    }

    pub fn jump_to_latest(&self) {
        if let Ok(mut view) = self.log_view.lock() {
            view.jump_to_latest();
        }
    }

    /// Resize the output panel viewport to `rows` rows.
    pub fn resize_log(&self, rows: u32) {
        if let Ok(mut view) = self.log_view.lock() {
            view.resize_rows(rows);
        }
    }

    /// Time left on the capture cooldown of `worker_id`.
    pub fn capture_cooldown(&self, worker_id: i64) -> Option<Duration> {
        self.cooldown
            .lock()
            .ok()
            .and_then(|c| c.remaining(worker_id, Instant::now()))
    }

    /// Drop all state, e.g. after logout.
    pub async fn reset(&self) {
        self.selection_epoch.fetch_add(1, Ordering::SeqCst);
        // Anything still in flight belongs to the previous session.
        let issued = self.refresh_issued.load(Ordering::SeqCst);
        self.refresh_applied.store(issued, Ordering::SeqCst);
        *self.state.write().await = DashboardState::default();
        if let Ok(mut view) = self.log_view.lock() {
            view.on_rows_changed(0);
            view.reset_for_worker();
        }
    }

    // ── Synchronization ─────────────────────────────────────────────

    /// Fetch all workers with detail and apply them.
    ///
    /// On success also reloads the task output of the selected worker, and
    /// the last screenshot when the refresh auto-selected a worker.
    pub async fn refresh(&self) {
        let seq = self.refresh_issued.fetch_add(1, Ordering::SeqCst) + 1;
        let result = fetch_all_workers(self.api.as_ref()).await;

        let selection_changed = {
            let mut state = self.state.write().await;
            if seq <= self.refresh_applied.load(Ordering::SeqCst) {
                debug!(seq, "Discarding refresh overtaken by a newer one");
                return;
            }
            match result {
                Ok(workers) => {
                    self.refresh_applied.store(seq, Ordering::SeqCst);
                    debug!(seq, count = workers.len(), "Workers refreshed");
                    if let Ok(mut cooldown) = self.cooldown.lock() {
                        let ids: Vec<i64> = workers.iter().map(|w| w.id).collect();
                        cooldown.retain_workers(&ids);
                    }
                    state.apply_refresh(workers)
                }
                Err(e) => {
                    warn!(error = %e, "Worker refresh failed, keeping last known state");
                    state.apply_refresh_error(e.to_string());
                    if e.is_unauthorized() {
                        self.auth_lost.notify_one();
                    }
                    return;
                }
            }
        };

        if selection_changed {
            self.on_selection_changed().await;
        } else {
            self.load_task_output().await;
        }
    }

    /// Select a worker. Local only, no backend call besides reloading the
    /// per-selection views.
    pub async fn select_worker(&self, id: i64) -> Result<(), ActionError> {
        let changed = {
            let mut state = self.state.write().await;
            if state.worker(id).is_none() {
                return Err(ActionError::WorkerNotFound { id });
            }
            let changed = state.selected_id != Some(id);
            state.selected_id = Some(id);
            changed
        };
        if changed {
            self.on_selection_changed().await;
        }
        Ok(())
    }

    async fn set_selection(&self, id: Option<i64>) {
        let changed = {
            let mut state = self.state.write().await;
            let changed = state.selected_id != id;
            state.selected_id = id;
            changed
        };
        if changed {
            self.on_selection_changed().await;
        }
    }

    async fn on_selection_changed(&self) {
        self.selection_epoch.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.write().await;
            state.task_output = None;
            state.last_screenshot = None;
        }
        if let Ok(mut view) = self.log_view.lock() {
            view.on_rows_changed(0);
            view.reset_for_worker();
        }
        self.load_task_output().await;
        self.load_last_screenshot().await;
    }

    /// Fetch full output (prompt, logs, result) of the selected worker's
    /// most recent task.
    pub async fn load_task_output(&self) {
        let epoch = self.selection_epoch.load(Ordering::SeqCst);
        let target = {
            let state = self.state.read().await;
            state
                .selected_worker()
                .and_then(most_recent_task)
                .map(|t| t.id)
        };

        let Some(task_id) = target else {
            self.apply_task_output(epoch, None).await;
            return;
        };

        match self.api.get_task(task_id).await {
            Ok(task) => self.apply_task_output(epoch, Some(TaskOutput::from(task))).await,
            Err(e) => debug!(task_id, error = %e, "Task output fetch failed"),
        }
    }

    async fn apply_task_output(&self, epoch: u64, output: Option<TaskOutput>) {
        let mut state = self.state.write().await;
        if self.selection_epoch.load(Ordering::SeqCst) != epoch {
            debug!("Dropping task output for a previous selection");
            return;
        }
        let rows = LogPanel::from_output(output.as_ref()).rows().len();
        let changed = state.task_output != output;
        state.task_output = output;
        drop(state);

        if changed {
            if let Ok(mut view) = self.log_view.lock() {
                view.on_rows_changed(rows);
            }
        }
    }

    /// Fetch the newest stored screenshot of the selected worker.
    pub async fn load_last_screenshot(&self) {
        let epoch = self.selection_epoch.load(Ordering::SeqCst);
        let selected = self.state.read().await.selected_id;

        let shot = match selected {
            Some(id) => match self.api.screenshots(id).await {
                Ok(shots) => shots.into_iter().next(),
                Err(e) => {
                    debug!(worker_id = id, error = %e, "Screenshot list fetch failed");
                    None
                }
            },
            None => None,
        };

        let mut state = self.state.write().await;
        if self.selection_epoch.load(Ordering::SeqCst) != epoch {
            debug!("Dropping screenshot for a previous selection");
            return;
        }
        state.last_screenshot = shot;
    }

    // ── Actions ─────────────────────────────────────────────────────

    /// Start an OFFLINE worker, stop anything else.
    ///
    /// Returns the issued action on success. Failures are logged and
    /// swallowed; the next poll shows the real state.
    pub async fn toggle_worker(&self, id: i64) -> Option<PowerAction> {
        let status = self.state.read().await.worker(id).map(|w| w.status)?;

        let (action, result) = if status == WorkerStatus::Offline {
            (PowerAction::Start, self.api.start_worker(id).await)
        } else {
            (PowerAction::Stop, self.api.stop_worker(id, self.force_stop).await)
        };

        match result {
            Ok(_) => {
                info!(worker_id = id, ?action, "Worker power request accepted");
                self.refresh().await;
                Some(action)
            }
            Err(e) => {
                warn!(worker_id = id, ?action, error = %e, "Worker power request failed");
                None
            }
        }
    }

    /// Delete a worker, clearing the selection if it was selected.
    ///
    /// Returns whether the backend accepted the delete. Failures are logged
    /// and swallowed.
    pub async fn delete_worker(&self, id: i64, force: bool) -> bool {
        match self.api.delete_worker(id, force).await {
            Ok(()) => {
                info!(worker_id = id, "Worker deleted");
                let was_selected = self.state.read().await.selected_id == Some(id);
                if was_selected {
                    self.set_selection(None).await;
                }
                self.refresh().await;
                true
            }
            Err(e) => {
                warn!(worker_id = id, error = %e, "Worker delete failed");
                false
            }
        }
    }

    /// Delete one task from its worker's history.
    pub async fn delete_task(&self, task_id: i64) -> Result<(), ActionError> {
        self.api.delete_task(task_id).await?;
        info!(task_id, "Task deleted");
        self.refresh().await;
        Ok(())
    }

    /// Create a worker, refresh, and select it.
    pub async fn spawn_worker(&self, name: &str) -> Result<SpawnedWorker, ActionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ActionError::EmptyName);
        }
        if self.state.read().await.workers.len() >= MAX_WORKERS {
            return Err(ActionError::WorkerLimitReached { max: MAX_WORKERS });
        }

        let created = self.api.create_worker(name).await?;
        info!(worker_id = created.worker.id, name, "Worker created");

        self.refresh().await;
        self.set_selection(Some(created.worker.id)).await;

        Ok(SpawnedWorker {
            worker: created.worker,
            display_password: created.vnc_password,
        })
    }

    /// Submit a task to the selected worker, optionally under a skill.
    pub async fn submit_task(&self, prompt: &str, skill: Option<&Skill>) -> Result<Task, ActionError> {
        let worker_id = {
            let state = self.state.read().await;
            validate_submit(state.selected_worker(), prompt)?.id
        };
        let prompt = match skill {
            Some(skill) => skill.compose(prompt),
            None => prompt.trim().to_string(),
        };

        let task = self.api.create_task(worker_id, &prompt).await?;
        info!(worker_id, task_id = task.id, "Task submitted");
        self.refresh().await;
        Ok(task)
    }

    /// Capture the selected worker's screen.
    pub async fn capture_screenshot(&self) -> Result<Screenshot, ActionError> {
        let epoch = self.selection_epoch.load(Ordering::SeqCst);
        let worker = self
            .selected_worker()
            .await
            .ok_or(ActionError::NoWorkerSelected)?;
        if !can_capture(&worker) {
            return Err(ActionError::CaptureNotAllowed {
                name: worker.name,
                status: worker.status.to_string(),
            });
        }
        if let Some(remaining) = self.capture_cooldown(worker.id) {
            return Err(ActionError::CaptureCoolingDown { remaining });
        }

        let shot = self.api.capture_screenshot(worker.id).await?;
        info!(worker_id = worker.id, screenshot_id = shot.id, "Screenshot captured");

        if let Ok(mut cooldown) = self.cooldown.lock() {
            cooldown.start(worker.id, Instant::now());
        }
        let mut state = self.state.write().await;
        if self.selection_epoch.load(Ordering::SeqCst) == epoch {
            state.last_screenshot = Some(shot.clone());
        }
        Ok(shot)
    }
}

/// Handle to the background refresh loop.
///
/// Dropping the handle stops polling.
pub struct Poller {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Poller {
    /// Stop polling and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Refresh immediately, then every `interval` until the handle is dropped.
pub fn spawn_poller(sync: Arc<Synchronizer>, interval: Duration) -> Poller {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Dashboard poller started, refreshing every {}s", interval.as_secs());
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            if shutdown_flag.load(Ordering::Relaxed) {
                debug!("Dashboard poller shutting down");
                return;
            }
            sync.refresh().await;
        }
    });

    Poller {
        handle: Some(handle),
        shutdown,
    }
}
