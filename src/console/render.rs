//! Plain-text views printed by the console.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::dashboard::skills::SKILLS;
use crate::dashboard::state::{DashboardState, can_capture, can_submit, submit_hint};
use crate::dashboard::stats::{FleetSummary, Gallery, ProfileStats, TaskHistory, WorkerStats};
use crate::dashboard::{LogPanel, LogViewer};
use crate::model::{AuthUser, MAX_WORKERS, Worker};

fn time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn shorten(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

/// Header line with fleet counts, plus the refresh error banner if any.
pub fn header(state: &DashboardState, user: Option<&AuthUser>) -> String {
    let summary = FleetSummary::of(&state.workers);
    let mut out = format!(
        "Fleet {}/{} · {} online · {} busy · {} starting",
        summary.total, MAX_WORKERS, summary.online, summary.busy, summary.starting
    );
    if let Some(user) = user {
        out.push_str(&format!(" · {}", user.handle()));
    }
    if let Some(error) = &state.fetch_error {
        out.push_str(&format!("\n! refresh failed: {error} (showing last known state)"));
    }
    out
}

/// The worker list; `*` marks the selection.
pub fn workers(state: &DashboardState) -> String {
    if state.workers.is_empty() {
        return format!("No workers yet. /spawn <name> to create one (max {MAX_WORKERS}).");
    }
    state
        .workers
        .iter()
        .map(|w| {
            let marker = if state.selected_id == Some(w.id) { '*' } else { ' ' };
            format!(
                "{marker} #{:<4} {:<20} {:<9} {} task(s)",
                w.id,
                shorten(&w.name, 20),
                w.status,
                w.tasks.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Status bezel of the selected worker: remote desktop port, capture
/// availability and the last screenshot.
pub fn bezel(state: &DashboardState, cooldown: Option<Duration>) -> String {
    let Some(worker) = state.selected_worker() else {
        return "No worker selected.".to_string();
    };
    let mut out = format!("#{} {} [{}]", worker.id, worker.name, worker.status);
    match worker.vnc_port {
        Some(port) => out.push_str(&format!(" · vnc :{port}")),
        None => out.push_str(" · vnc offline"),
    }

    let capture = if !can_capture(worker) {
        "unavailable".to_string()
    } else if let Some(left) = cooldown {
        format!("cooling down {}s", left.as_secs().max(1))
    } else {
        "ready".to_string()
    };
    out.push_str(&format!("\ncapture: {capture}"));
    if let Some(shot) = &state.last_screenshot {
        out.push_str(&format!(
            " · last {} {}",
            time(&shot.created_at),
            shot.s3_url
        ));
    }
    if let Some(hint) = submit_hint(Some(worker)) {
        out.push_str(&format!("\ntasks: {hint}"));
    }
    out
}

/// Why a task line would not be sent, or `None` when it can go out.
pub fn submit_blocked(worker: Option<&Worker>, prompt: &str) -> Option<String> {
    if can_submit(worker, prompt) {
        return None;
    }
    Some(match submit_hint(worker) {
        Some(hint) => format!("Task not sent: {hint}."),
        None => "Task not sent: type a prompt.".to_string(),
    })
}

/// The output panel as currently scrolled.
pub fn output(state: &DashboardState, view: &LogViewer) -> String {
    let panel = LogPanel::from_output(state.task_output.as_ref());
    let Some(output) = &state.task_output else {
        return "No task output for this worker.".to_string();
    };

    let mut out = format!("Task #{} [{}]", output.task_id, output.status);
    if let Some(prompt) = &panel.prompt {
        out.push_str(&format!("\n> {}", shorten(prompt, 100)));
    }
    let rows = panel.rows();
    let visible = view.visible_rows();
    let end = visible.end.min(rows.len());
    let start = visible.start.min(end);
    for row in &rows[start..end] {
        out.push('\n');
        out.push_str(row);
    }
    out.push_str(&format!("\n-- {} --", panel.footer()));
    if view.show_jump() {
        out.push_str("  ↓ latest (/latest)");
    }
    out
}

pub fn detail(worker: &Worker) -> String {
    let stats = WorkerStats::of(worker);
    let mut out = format!("#{} {} [{}]", worker.id, worker.name, worker.status);
    if let Some(container) = &worker.container_id {
        out.push_str(&format!("\ncontainer: {}", shorten(container, 12)));
    }
    if let Some(created) = &worker.created_at {
        out.push_str(&format!("\ncreated: {}", time(created)));
    }
    out.push_str(&format!(
        "\ntasks: {} total · {} completed · {} failed",
        stats.total_tasks, stats.completed, stats.failed
    ));
    if let Some(active) = &stats.active_task {
        out.push_str(&format!("\nrunning: #{} {}", active.id, shorten(&active.prompt, 60)));
    }
    out.push_str(if stats.can_toggle {
        "\npower: /toggle available"
    } else {
        "\npower: wait for the worker to settle"
    });
    out
}

pub fn history(history: &TaskHistory) -> String {
    let mut out = format!("Task history of #{} {}", history.worker.id, history.worker.name);
    if history.tasks.is_empty() {
        out.push_str("\n(no tasks)");
    }
    for task in &history.tasks {
        out.push_str(&format!(
            "\n#{:<5} {} {:<10} {}",
            task.id,
            time(&task.created_at),
            task.status,
            shorten(&task.prompt, 60)
        ));
    }
    out
}

pub fn gallery(gallery: &Gallery) -> String {
    let mut out = format!("Screenshots of #{} {}", gallery.worker.id, gallery.worker.name);
    if gallery.screenshots.is_empty() {
        out.push_str("\n(none captured)");
    }
    for shot in &gallery.screenshots {
        out.push_str(&format!("\n#{:<5} {} {}", shot.id, time(&shot.created_at), shot.s3_url));
    }
    out
}

pub fn profile(user: &AuthUser, stats: &ProfileStats) -> String {
    format!(
        "{} ({})\nactive workers: {}\ntasks: {}\nscreenshots: {}",
        user.handle(),
        user.email,
        stats.active_workers,
        stats.total_tasks,
        stats.total_screenshots
    )
}

pub fn help() -> String {
    let mut out = String::from(
        "Commands:
  /workers                      list workers
  /select <id>                  inspect a worker
  /spawn <name>                 create a worker
  /toggle <id>                  start an offline worker, stop anything else
  /delete <id> [--force]        delete a worker
  /task [--skill <id>] <prompt> submit a task to the selected worker
  /task-delete <id>             delete a task from history
  /capture                      screenshot the selected worker
  /shots [id]                   screenshot gallery
  /history [id]                 task history
  /detail [id]                  worker details
  /output                       show task output
  /scroll <±rows>               scroll task output
  /latest                       jump to the latest output
  /rows <rows>                  resize the output panel
  /login <email> <password>
  /register <email> <password> <confirm>
  /logout
  /me                           profile and totals
  /passwd <current> <new>
  /stats                        fleet summary
  /quit
Skills:",
    );
    for skill in SKILLS {
        out.push_str(&format!("\n  {:<20} {}", skill.id, skill.hint));
    }
    out
}
