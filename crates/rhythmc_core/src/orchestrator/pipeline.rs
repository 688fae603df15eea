//! Pipeline runner that executes steps in sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, JobPhase, JobState, StepOutcome};

/// Pipeline that runs a sequence of steps.
///
/// Steps run in order with validation before and after each one. The
/// runner owns phase transitions and stage boundaries, and stops at the
/// first failure.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Share cancellation with an existing handle.
    pub fn with_cancel_handle(mut self, handle: &CancelHandle) -> Self {
        self.cancelled = Arc::clone(&handle.flag);
        self
    }

    /// Call `cancel()` on the returned handle to stop the pipeline at the
    /// next step boundary.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Number of numbered steps that apply to this job.
    pub fn total_steps(&self, ctx: &Context) -> u32 {
        self.steps
            .iter()
            .filter(|s| s.applies_to(ctx) && s.is_numbered())
            .count() as u32
    }

    /// Run every applicable step, then move the job to `Done`.
    ///
    /// The step total is fixed before the first progress update.
    pub async fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult {
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
            total_steps: self.total_steps(ctx),
        };
        ctx.progress.set_total_steps(result.total_steps);
        ctx.logger.info(&format!(
            "Pipeline: {} numbered steps ({})",
            result.total_steps,
            self.step_names(ctx).join(", ")
        ));

        for step in self.steps.iter().filter(|s| s.applies_to(ctx)) {
            let step_name = step.name();
            if self.is_cancelled() {
                ctx.logger
                    .warn(&format!("Pipeline cancelled before step '{}'", step_name));
                return Err(PipelineError::cancelled(&ctx.job_id));
            }

            let fail = |e| {
                ctx.logger.error(&format!("{} failed: {}", step_name, e));
                PipelineError::step_failed(&ctx.job_id, step_name, e)
            };

            state.transition(step.phase()).map_err(fail)?;
            ctx.logger.phase(step_name);
            if step.starts_stage() {
                if step.is_numbered() {
                    ctx.progress.begin_numbered_stage(step.description());
                } else {
                    ctx.progress.begin_stage(step.description());
                }
            }

            ctx.logger.debug(&format!("Validating input for '{}'", step_name));
            step.validate_input(ctx, state).map_err(fail)?;

            ctx.logger.debug(&format!("Executing '{}'", step_name));
            let outcome = step.execute(ctx, state).await.map_err(fail)?;

            match outcome {
                StepOutcome::Success => {
                    ctx.logger
                        .debug(&format!("Validating output for '{}'", step_name));
                    step.validate_output(ctx, state).map_err(fail)?;
                    if step.starts_stage() {
                        ctx.progress.finish_stage();
                    }
                    ctx.logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    if step.starts_stage() {
                        ctx.progress.finish_stage();
                    }
                    ctx.logger.info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
            }
        }

        state
            .transition(JobPhase::Done)
            .map_err(|e| PipelineError::step_failed(&ctx.job_id, "Pipeline", e))?;
        ctx.logger.success("Pipeline completed successfully");

        Ok(result)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Names of the steps that apply to this job, in order.
    pub fn step_names(&self, ctx: &Context) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.applies_to(ctx))
            .map(|s| s.name())
            .collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for cancelling a running pipeline.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pipeline will stop at the next step boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
    /// Numbered steps counted for this job.
    pub total_steps: u32,
}
