//! Dashboard: fleet state, synchronization and the task output panel.

pub mod cooldown;
pub mod log_view;
pub mod skills;
pub mod state;
pub mod stats;
pub mod sync;

pub use cooldown::{CAPTURE_COOLDOWN, CaptureCooldown};
pub use log_view::{LogPanel, LogViewer};
pub use skills::{SKILLS, Skill};
pub use state::{DashboardState, TaskOutput};
pub use sync::{PowerAction, Poller, SpawnedWorker, Synchronizer, spawn_poller};
