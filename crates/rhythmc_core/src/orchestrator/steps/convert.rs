//! Conversion step.

use async_trait::async_trait;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobPhase, JobState, StepOutcome};

use super::StageObserver;

/// Re-encodes non-Ogg input to mono Ogg Vorbis.
///
/// Only applies when the input does not already have the canonical
/// extension; canonical input goes straight to processing.
pub struct ConvertStep;

impl ConvertStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConvertStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for ConvertStep {
    fn name(&self) -> &str {
        "Conversion"
    }

    fn description(&self) -> &str {
        "Converting audio"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::Transcoding
    }

    fn applies_to(&self, ctx: &Context) -> bool {
        ctx.request.needs_conversion()
    }

    fn validate_input(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        let input = ctx.input_path()?;
        if !input.exists() {
            return Err(StepError::invalid_input(format!(
                "Audio file not found: {}",
                input.display()
            )));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let input = ctx.input_path()?;
        let observer = StageObserver::new(ctx, 0.0, 100.0);
        let converted = ctx.engine.convert(input, &ctx.work_dir, &observer).await?;

        ctx.logger
            .info(&format!("Converted {} -> {}", input.display(), converted.display()));
        state.source = Some(converted);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.source.is_none() {
            return Err(StepError::invalid_output("Converted audio not recorded"));
        }
        Ok(())
    }
}
