//! Duration probe step.

use async_trait::async_trait;

use crate::models::duration_to_ticks;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobPhase, JobState, StepOutcome};

/// Measures the rendered primary audio and records its length in ticks.
pub struct ProbeDurationStep;

impl ProbeDurationStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProbeDurationStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for ProbeDurationStep {
    fn name(&self) -> &str {
        "Duration probe"
    }

    fn description(&self) -> &str {
        "Measuring audio duration"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::ProbingDuration
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.primary.is_none() {
            return Err(StepError::invalid_input("No rendered audio to probe"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let primary = state
            .primary
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("No rendered audio to probe"))?;

        let seconds = ctx.engine.probe_duration(&primary.path).await?;
        let ticks = duration_to_ticks(seconds);
        ctx.logger
            .info(&format!("Duration: {:.3}s = {} ticks", seconds, ticks));

        state.duration_ticks = Some(ticks);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.duration_ticks.is_none() {
            return Err(StepError::invalid_output("Duration not recorded"));
        }
        Ok(())
    }
}
