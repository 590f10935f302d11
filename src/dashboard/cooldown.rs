//! Client-side mirror of the backend's screenshot rate limit.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One capture per worker per 30 seconds.
pub const CAPTURE_COOLDOWN: Duration = Duration::from_secs(30);

/// Per-worker capture cooldown. Advisory only; the backend is the authority.
#[derive(Debug, Clone)]
pub struct CaptureCooldown {
    period: Duration,
    started: HashMap<i64, Instant>,
}

impl Default for CaptureCooldown {
    fn default() -> Self {
        Self::new(CAPTURE_COOLDOWN)
    }
}

impl CaptureCooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            started: HashMap::new(),
        }
    }

    /// Start the cooldown after a successful capture.
    pub fn start(&mut self, worker_id: i64, now: Instant) {
        self.started.insert(worker_id, now);
    }

    /// Time left before the worker may be captured again.
    pub fn remaining(&self, worker_id: i64, now: Instant) -> Option<Duration> {
        let started = self.started.get(&worker_id)?;
        let elapsed = now.saturating_duration_since(*started);
        self.period.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    pub fn is_cooling(&self, worker_id: i64, now: Instant) -> bool {
        self.remaining(worker_id, now).is_some()
    }

    /// Drop entries for workers that no longer exist.
    pub fn retain_workers(&mut self, ids: &[i64]) {
        self.started.retain(|id, _| ids.contains(id));
    }
}
