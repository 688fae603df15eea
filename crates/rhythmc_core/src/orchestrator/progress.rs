//! Stage-relative progress reporting.
//!
//! Each stage runs its own 0–100 bar. Numbered stages also advance the
//! `(step/total)` counter shown in front of the status text.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::logging::JobLogger;

/// Progress callback type.
///
/// Arguments: (stage_label, percent_complete, status_line)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// `base + weight × fraction`, clamped to `[0, 100]`.
///
/// `fraction` is clamped to `[0, 1]`; NaN counts as 0.
pub fn weighted_percent(base: f64, weight: f64, fraction: f64) -> u32 {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let value = base + weight * fraction;
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u32
}

/// A copy of the current progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub step: u32,
    pub total_steps: u32,
    pub stage: String,
    pub percent: u32,
    pub status: String,
}

#[derive(Debug, Default)]
struct ProgressState {
    step: u32,
    total_steps: u32,
    numbered: bool,
    stage: String,
    detail: Option<String>,
    percent: u32,
    status: String,
}

impl ProgressState {
    fn compose_status(&mut self) {
        let mut status = if self.numbered {
            format!("({}/{}) {}", self.step, self.total_steps, self.stage)
        } else {
            self.stage.clone()
        };
        if let Some(detail) = &self.detail {
            status.push_str(&format!(" ({})", detail));
        }
        self.status = status;
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            step: self.step,
            total_steps: self.total_steps,
            stage: self.stage.clone(),
            percent: self.percent,
            status: self.status.clone(),
        }
    }
}

/// Progress state for one job.
pub struct ProgressReporter {
    state: Mutex<ProgressState>,
    callback: Option<ProgressCallback>,
    logger: Option<Arc<JobLogger>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProgressState::default()),
            callback: None,
            logger: None,
        }
    }

    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Mirror status lines into the job log.
    pub fn with_logger(mut self, logger: Arc<JobLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Fix the number of numbered steps. Only the first call has effect.
    pub fn set_total_steps(&self, total: u32) {
        let mut state = self.state.lock();
        if state.total_steps == 0 {
            state.total_steps = total;
        }
    }

    pub fn total_steps(&self) -> u32 {
        self.state.lock().total_steps
    }

    /// Start a numbered stage: advance the step counter and reset to 0%.
    pub fn begin_numbered_stage(&self, label: &str) {
        self.update(|state| {
            state.step = (state.step + 1).min(state.total_steps);
            state.numbered = true;
            Self::reset_stage(state, label);
        });
    }

    /// Start a stage without a step number and reset to 0%.
    pub fn begin_stage(&self, label: &str) {
        self.update(|state| {
            state.numbered = false;
            Self::reset_stage(state, label);
        });
    }

    /// Report `base + weight × fraction` within the current stage.
    ///
    /// Never lowers the current value. Returns the resulting percent.
    pub fn report_within(&self, base: f64, weight: f64, fraction: f64) -> u32 {
        self.set_percent(weighted_percent(base, weight, fraction))
    }

    /// Raise the stage percent to `percent` (clamped to 100).
    pub fn set_percent(&self, percent: u32) -> u32 {
        let percent = percent.min(100);
        let mut result = 0;
        self.update(|state| {
            if percent > state.percent {
                state.percent = percent;
            }
            result = state.percent;
        });
        result
    }

    /// Append a detail such as `2/5` to the status line.
    pub fn set_detail(&self, detail: impl Into<String>) {
        let detail = detail.into();
        self.update(|state| {
            state.detail = Some(detail);
            state.compose_status();
        });
    }

    /// Replace the status line without touching the stage or percent.
    pub fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        self.update(|state| state.status = status);
    }

    /// Drive the current stage to 100%.
    pub fn finish_stage(&self) {
        self.set_percent(100);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().snapshot()
    }

    fn reset_stage(state: &mut ProgressState, label: &str) {
        state.stage = label.to_string();
        state.detail = None;
        state.percent = 0;
        state.compose_status();
    }

    /// Apply `change` and emit the result if anything visible changed.
    fn update(&self, change: impl FnOnce(&mut ProgressState)) {
        let snapshot = {
            let mut state = self.state.lock();
            let before = state.snapshot();
            change(&mut state);
            let after = state.snapshot();
            if after == before {
                return;
            }
            after
        };

        if let Some(logger) = &self.logger {
            logger.status(&snapshot.status, snapshot.percent);
        }
        if let Some(callback) = &self.callback {
            callback(&snapshot.stage, snapshot.percent, &snapshot.status);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
