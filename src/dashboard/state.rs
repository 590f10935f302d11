//! Dashboard state and the pure rules derived from it.
//!
//! Selected worker, most recent task and action eligibility are computed
//! from `(workers, selected_id)` on demand and never stored alongside them.

use crate::error::ActionError;
use crate::model::{Screenshot, Task, TaskStatus, TaskSummary, Worker, WorkerStatus};

/// Full output of the most recent task of the selected worker.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput {
    pub task_id: i64,
    pub worker_id: i64,
    pub status: TaskStatus,
    pub prompt: String,
    pub logs: Option<String>,
    pub result: Option<String>,
}

impl From<Task> for TaskOutput {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            worker_id: task.worker_id,
            status: task.status,
            prompt: task.prompt,
            logs: task.logs,
            result: task.result,
        }
    }
}

/// In-memory view of the fleet as last synchronized from the backend.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    /// Workers in backend order.
    pub workers: Vec<Worker>,
    /// Local-only selection.
    pub selected_id: Option<i64>,
    /// Message of the last failed background refresh, cleared on success.
    pub fetch_error: Option<String>,
    pub last_screenshot: Option<Screenshot>,
    pub task_output: Option<TaskOutput>,
}

impl DashboardState {
    pub fn selected_worker(&self) -> Option<&Worker> {
        selected_worker(&self.workers, self.selected_id)
    }

    pub fn worker(&self, id: i64) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    /// Replace the collection after a successful refresh.
    ///
    /// Auto-selects the first worker only when nothing is selected yet.
    /// Returns whether the selection changed.
    pub fn apply_refresh(&mut self, workers: Vec<Worker>) -> bool {
        self.workers = workers;
        self.fetch_error = None;
        if self.selected_id.is_none() {
            self.selected_id = self.workers.first().map(|w| w.id);
            return self.selected_id.is_some();
        }
        false
    }

    /// Record a failed refresh. The last-known workers stay in place.
    pub fn apply_refresh_error(&mut self, message: String) {
        self.fetch_error = Some(message);
    }
}

/// First worker whose id matches the selection.
pub fn selected_worker(workers: &[Worker], selected_id: Option<i64>) -> Option<&Worker> {
    let id = selected_id?;
    workers.iter().find(|w| w.id == id)
}

/// The task with the greatest creation timestamp.
///
/// The backend does not order the embedded task list, so this never relies
/// on position.
pub fn most_recent_task(worker: &Worker) -> Option<&TaskSummary> {
    worker.tasks.iter().max_by_key(|t| t.created_at)
}

/// The task currently being executed, if any.
pub fn active_task(worker: &Worker) -> Option<&TaskSummary> {
    worker
        .tasks
        .iter()
        .find(|t| t.status == TaskStatus::Processing)
}

/// Whether the submit action is enabled.
pub fn can_submit(worker: Option<&Worker>, prompt: &str) -> bool {
    validate_submit(worker, prompt).is_ok()
}

pub fn validate_submit<'a>(
    worker: Option<&'a Worker>,
    prompt: &str,
) -> Result<&'a Worker, ActionError> {
    if prompt.trim().is_empty() {
        return Err(ActionError::EmptyPrompt);
    }
    let worker = worker.ok_or(ActionError::NoWorkerSelected)?;
    if worker.status != WorkerStatus::Idle {
        return Err(ActionError::WorkerNotIdle {
            name: worker.name.clone(),
            status: worker.status.to_string(),
        });
    }
    Ok(worker)
}

/// Capture needs a running desktop: IDLE or BUSY.
pub fn can_capture(worker: &Worker) -> bool {
    matches!(worker.status, WorkerStatus::Idle | WorkerStatus::Busy)
}

/// Explanation shown beside the task input when submission is blocked by
/// worker state.
pub fn submit_hint(worker: Option<&Worker>) -> Option<&'static str> {
    let Some(worker) = worker else {
        return Some("select a worker to submit a task");
    };
    match worker.status {
        WorkerStatus::Idle => None,
        WorkerStatus::Busy => Some("worker is busy, wait for the task to finish"),
        WorkerStatus::Starting => Some("worker is initializing, please wait"),
        WorkerStatus::Offline => Some("worker is offline, start it first"),
        WorkerStatus::Error => Some("worker is in an error state"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ts, worker};

    fn summary(id: i64, minute: u32, status: TaskStatus) -> TaskSummary {
        TaskSummary {
            id,
            prompt: format!("task {id}"),
            status,
            created_at: ts(minute),
        }
    }

    #[test]
    fn auto_selects_first_only_when_nothing_selected() {
        for size in 0..=3 {
            let workers: Vec<Worker> = (1..=size)
                .map(|id| worker(id, "w", WorkerStatus::Idle))
                .collect();

            let mut empty = DashboardState::default();
            let changed = empty.apply_refresh(workers.clone());
            assert_eq!(empty.selected_id, workers.first().map(|w| w.id));
            assert_eq!(changed, size > 0);

            let mut selected = DashboardState {
                selected_id: Some(3),
                ..Default::default()
            };
            assert!(!selected.apply_refresh(workers));
            assert_eq!(selected.selected_id, Some(3));
        }
    }

    #[test]
    fn refresh_clears_previous_error() {
        let mut state = DashboardState::default();
        state.apply_refresh_error("HTTP 502".into());
        assert_eq!(state.fetch_error.as_deref(), Some("HTTP 502"));

        state.apply_refresh(vec![worker(1, "a", WorkerStatus::Idle)]);
        assert!(state.fetch_error.is_none());
    }

    #[test]
    fn refresh_error_keeps_stale_workers() {
        let mut state = DashboardState::default();
        state.apply_refresh(vec![worker(1, "a", WorkerStatus::Idle)]);
        state.apply_refresh_error("connection refused".into());
        assert_eq!(state.workers.len(), 1);
        assert_eq!(state.selected_id, Some(1));
    }

    #[test]
    fn selected_worker_follows_id() {
        let workers = vec![
            worker(1, "a", WorkerStatus::Idle),
            worker(2, "b", WorkerStatus::Busy),
        ];
        assert_eq!(selected_worker(&workers, Some(2)).unwrap().name, "b");
        assert!(selected_worker(&workers, Some(9)).is_none());
        assert!(selected_worker(&workers, None).is_none());
    }

    #[test]
    fn most_recent_task_uses_timestamps_not_order() {
        let mut w = worker(1, "a", WorkerStatus::Idle);
        w.tasks = vec![
            summary(1, 5, TaskStatus::Completed),
            summary(2, 20, TaskStatus::Failed),
            summary(3, 10, TaskStatus::Completed),
        ];
        assert_eq!(most_recent_task(&w).unwrap().id, 2);

        w.tasks.clear();
        assert!(most_recent_task(&w).is_none());
    }

    #[test]
    fn submit_requires_idle_worker_and_text() {
        let idle = worker(1, "a", WorkerStatus::Idle);
        assert!(can_submit(Some(&idle), "open the site"));
        assert!(!can_submit(Some(&idle), "  "));
        assert!(!can_submit(None, "open the site"));

        for status in [
            WorkerStatus::Offline,
            WorkerStatus::Starting,
            WorkerStatus::Busy,
            WorkerStatus::Error,
        ] {
            let w = worker(1, "a", status);
            assert!(!can_submit(Some(&w), "open the site"));
        }
    }

    #[test]
    fn whitespace_prompt_is_rejected_regardless_of_status() {
        let idle = worker(1, "a", WorkerStatus::Idle);
        assert!(matches!(
            validate_submit(Some(&idle), " \t\n"),
            Err(ActionError::EmptyPrompt)
        ));
        assert!(matches!(
            validate_submit(None, "  "),
            Err(ActionError::EmptyPrompt)
        ));
    }

    #[test]
    fn capture_allowed_for_running_desktops_only() {
        assert!(can_capture(&worker(1, "a", WorkerStatus::Idle)));
        assert!(can_capture(&worker(1, "a", WorkerStatus::Busy)));
        assert!(!can_capture(&worker(1, "a", WorkerStatus::Starting)));
        assert!(!can_capture(&worker(1, "a", WorkerStatus::Offline)));
        assert!(!can_capture(&worker(1, "a", WorkerStatus::Error)));
    }

    #[test]
    fn hints_follow_status() {
        assert!(submit_hint(None).is_some());
        assert!(submit_hint(Some(&worker(1, "a", WorkerStatus::Idle))).is_none());
        assert_eq!(
            submit_hint(Some(&worker(1, "a", WorkerStatus::Busy))),
            Some("worker is busy, wait for the task to finish")
        );
    }

    #[test]
    fn active_task_is_the_processing_one() {
        let mut w = worker(1, "a", WorkerStatus::Busy);
        w.tasks = vec![
            summary(1, 1, TaskStatus::Completed),
            summary(2, 2, TaskStatus::Processing),
        ];
        assert_eq!(active_task(&w).unwrap().id, 2);
    }
}
