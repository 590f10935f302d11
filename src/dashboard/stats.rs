//! Fleet summaries and the per-worker history views.

use crate::api::WorkerApi;
use crate::error::ApiError;
use crate::model::{Screenshot, TaskStatus, TaskSummary, Worker, WorkerStatus};

use super::state::active_task;

/// Counts shown in the console header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FleetSummary {
    pub total: usize,
    pub online: usize,
    pub busy: usize,
    pub starting: usize,
}

impl FleetSummary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = WorkerStatus>) -> Self {
        statuses
            .into_iter()
            .fold(Self::default(), |mut acc, status| {
                acc.total += 1;
                if status.is_online() {
                    acc.online += 1;
                }
                match status {
                    WorkerStatus::Busy => acc.busy += 1,
                    WorkerStatus::Starting => acc.starting += 1,
                    _ => {}
                }
                acc
            })
    }

    pub fn of(workers: &[Worker]) -> Self {
        Self::from_statuses(workers.iter().map(|w| w.status))
    }
}

/// Detail view numbers for one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStats {
    pub total_tasks: usize,
    pub completed: usize,
    pub failed: usize,
    pub active_task: Option<TaskSummary>,
    /// Start/stop is offered only from a settled state.
    pub can_toggle: bool,
}

impl WorkerStats {
    pub fn of(worker: &Worker) -> Self {
        let count = |status: TaskStatus| worker.tasks.iter().filter(|t| t.status == status).count();
        Self {
            total_tasks: worker.tasks.len(),
            completed: count(TaskStatus::Completed),
            failed: count(TaskStatus::Failed),
            active_task: active_task(worker).cloned(),
            can_toggle: matches!(worker.status, WorkerStatus::Idle | WorkerStatus::Offline),
        }
    }
}

/// Account-wide totals for the profile view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProfileStats {
    pub active_workers: usize,
    pub total_tasks: usize,
    pub total_screenshots: usize,
}

/// Gather profile totals. A worker whose screenshot list cannot be loaded
/// contributes zero screenshots.
pub async fn load_profile_stats(api: &dyn WorkerApi) -> Result<ProfileStats, ApiError> {
    let summaries = api.list_workers().await?;
    let active_workers = summaries.iter().filter(|s| s.status.is_online()).count();

    let workers = futures::future::join_all(summaries.iter().map(|s| api.get_worker(s.id)));
    let shots = futures::future::join_all(summaries.iter().map(|s| api.screenshots(s.id)));
    let (workers, shots) = futures::join!(workers, shots);

    let mut total_tasks = 0;
    for worker in workers {
        total_tasks += worker?.tasks.len();
    }
    let total_screenshots = shots
        .into_iter()
        .map(|r| r.map(|v| v.len()).unwrap_or(0))
        .sum();

    Ok(ProfileStats {
        active_workers,
        total_tasks,
        total_screenshots,
    })
}

/// Task history page for one worker.
#[derive(Debug, Clone)]
pub struct TaskHistory {
    pub worker: Worker,
    pub tasks: Vec<TaskSummary>,
}

pub async fn load_task_history(api: &dyn WorkerApi, worker_id: i64) -> Result<TaskHistory, ApiError> {
    let (worker, tasks) = futures::join!(api.get_worker(worker_id), api.worker_tasks(worker_id));
    Ok(TaskHistory {
        worker: worker?,
        tasks: tasks?,
    })
}

/// Screenshot gallery for one worker, newest first as returned.
#[derive(Debug, Clone)]
pub struct Gallery {
    pub worker: Worker,
    pub screenshots: Vec<Screenshot>,
}

pub async fn load_gallery(api: &dyn WorkerApi, worker_id: i64) -> Result<Gallery, ApiError> {
    let (worker, screenshots) =
        futures::join!(api.get_worker(worker_id), api.screenshots(worker_id));
    Ok(Gallery {
        worker: worker?,
        screenshots: screenshots?,
    })
}
