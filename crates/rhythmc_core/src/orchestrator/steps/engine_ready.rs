//! Engine readiness step.

use async_trait::async_trait;

use crate::orchestrator::errors::StepResult;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobPhase, JobState, StepOutcome};

/// Waits until the shared audio engine is loaded.
///
/// Loads it if no other job has; joins an in-flight load otherwise.
pub struct EngineReadyStep;

impl EngineReadyStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EngineReadyStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for EngineReadyStep {
    fn name(&self) -> &str {
        "Engine"
    }

    fn description(&self) -> &str {
        "Loading audio engine"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::AwaitingEngineReady
    }

    fn is_numbered(&self) -> bool {
        false
    }

    fn validate_input(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
        Ok(())
    }

    async fn execute(&self, ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
        if ctx.gate.is_ready() {
            return Ok(StepOutcome::Skipped("engine already loaded".to_string()));
        }
        ctx.gate.ensure_ready(ctx.engine.as_ref()).await?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
        Ok(())
    }
}
