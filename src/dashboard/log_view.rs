//! Task output panel: content shaping and the stick-to-bottom scroll model.
//!
//! The viewer follows new output only while the operator is already near
//! the bottom. Once they scroll up it stays put and offers a jump to the
//! latest output instead.

use super::state::TaskOutput;

/// Distance from the bottom, in pixels, that still counts as "at bottom".
pub const STICK_THRESHOLD_PX: u32 = 64;

/// Height of one rendered log row, in pixels.
pub const ROW_HEIGHT_PX: u32 = 17;

/// Scroll state of the output panel, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogViewer {
    scroll_top: u32,
    viewport_height: u32,
    content_height: u32,
    at_bottom: bool,
    show_jump: bool,
}

impl LogViewer {
    pub fn new(viewport_height: u32) -> Self {
        Self {
            scroll_top: 0,
            viewport_height,
            content_height: 0,
            at_bottom: true,
            show_jump: false,
        }
    }

    /// Viewport sized in rows.
    pub fn with_rows(rows: u32) -> Self {
        Self::new(rows.saturating_mul(ROW_HEIGHT_PX))
    }

    pub fn scroll_top(&self) -> u32 {
        self.scroll_top
    }

    pub fn content_height(&self) -> u32 {
        self.content_height
    }

    pub fn viewport_height(&self) -> u32 {
        self.viewport_height
    }

    /// Whether the "jump to latest" affordance is visible.
    pub fn show_jump(&self) -> bool {
        self.show_jump
    }

    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    /// Largest reachable scroll offset.
    pub fn bottom(&self) -> u32 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    fn distance_from_bottom(&self) -> u32 {
        self.content_height
            .saturating_sub(self.scroll_top)
            .saturating_sub(self.viewport_height)
    }

    /// Operator scrolled to `scroll_top`.
    pub fn on_scroll(&mut self, scroll_top: u32) {
        self.scroll_top = scroll_top.min(self.bottom());
        self.at_bottom = self.distance_from_bottom() < STICK_THRESHOLD_PX;
        self.show_jump = !self.at_bottom;
    }

    /// Scroll by a signed number of pixels.
    pub fn scroll_by(&mut self, delta: i64) {
        let target = (i64::from(self.scroll_top) + delta).clamp(0, i64::from(self.bottom()));
        self.on_scroll(target as u32);
    }

    /// Scroll by a signed number of rows.
    pub fn scroll_rows(&mut self, rows: i64) {
        self.scroll_by(rows.saturating_mul(i64::from(ROW_HEIGHT_PX)));
    }

    /// Content changed size. Follows the new bottom only when the view was
    /// at the bottom before the change.
    pub fn on_content_changed(&mut self, content_height: u32) {
        self.content_height = content_height;
        if self.at_bottom {
            self.scroll_top = self.bottom();
        } else {
            self.scroll_top = self.scroll_top.min(self.bottom());
            self.show_jump = true;
        }
    }

    /// Content changed to `rows` rendered rows.
    pub fn on_rows_changed(&mut self, rows: usize) {
        let rows = u32::try_from(rows).unwrap_or(u32::MAX);
        self.on_content_changed(rows.saturating_mul(ROW_HEIGHT_PX));
    }

    /// Viewport resized. Keeps following if it was following.
    pub fn on_resize(&mut self, viewport_height: u32) {
        self.viewport_height = viewport_height;
        if self.at_bottom {
            self.scroll_top = self.bottom();
        } else {
            self.scroll_top = self.scroll_top.min(self.bottom());
        }
    }

    /// Viewport resized to `rows` rendered rows.
    pub fn resize_rows(&mut self, rows: u32) {
        self.on_resize(rows.saturating_mul(ROW_HEIGHT_PX));
    }

    /// The inspected worker changed: always land on the bottom.
    pub fn reset_for_worker(&mut self) {
        self.scroll_top = self.bottom();
        self.at_bottom = true;
        self.show_jump = false;
    }

    /// "Jump to latest" pressed.
    pub fn jump_to_latest(&mut self) {
        self.reset_for_worker();
    }

    /// Indices of the rows currently in view.
    pub fn visible_rows(&self) -> std::ops::Range<usize> {
        let first = (self.scroll_top / ROW_HEIGHT_PX) as usize;
        let count = self.viewport_height.div_ceil(ROW_HEIGHT_PX) as usize;
        first..first + count
    }
}

/// Rendered content of the output panel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogPanel {
    pub prompt: Option<String>,
    /// Non-blank log lines.
    pub lines: Vec<String>,
    pub result: Option<String>,
}

impl LogPanel {
    pub fn from_output(output: Option<&TaskOutput>) -> Self {
        let Some(output) = output else {
            return Self::default();
        };
        let lines = output
            .logs
            .as_deref()
            .map(|logs| {
                logs.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            prompt: Some(output.prompt.clone()).filter(|p| !p.is_empty()),
            lines,
            result: output.result.clone().filter(|r| !r.is_empty()),
        }
    }

    pub fn has_content(&self) -> bool {
        !self.lines.is_empty() || self.result.is_some()
    }

    /// Every row the panel body renders: log lines, then a result block.
    pub fn rows(&self) -> Vec<String> {
        let mut rows = self.lines.clone();
        if let Some(result) = &self.result {
            rows.push(String::new());
            rows.push("RESULT".to_string());
            rows.extend(result.lines().map(str::to_string));
        }
        rows
    }

    pub fn footer(&self) -> String {
        if !self.lines.is_empty() {
            format!("{} lines", self.lines.len())
        } else if self.result.is_some() {
            "result only".to_string()
        } else {
            "no output".to_string()
        }
    }
}
