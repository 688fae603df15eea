//! Identifier encoding step.

use async_trait::async_trait;

use crate::identifier::{self, IdentifierError};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobPhase, JobState, StepOutcome};

/// Builds the identifier players paste into `/editor create`.
pub struct EncodeStep;

impl EncodeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EncodeStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for EncodeStep {
    fn name(&self) -> &str {
        "Encoding"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::Encoding
    }

    fn is_numbered(&self) -> bool {
        false
    }

    /// Encoding finishes the upload stage rather than starting its own.
    fn starts_stage(&self) -> bool {
        false
    }

    fn applies_to(&self, ctx: &Context) -> bool {
        ctx.uploads_enabled()
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.hash.as_deref().map_or(true, str::is_empty) {
            return Err(IdentifierError::MissingField("hash").into());
        }
        if state.duration_ticks.is_none() {
            return Err(StepError::invalid_input("Duration was not probed"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let hash = state.hash.as_deref().unwrap_or_default();
        let ticks = state
            .duration_ticks
            .ok_or_else(|| StepError::invalid_input("Duration was not probed"))?;

        let id = identifier::encode(
            ctx.settings.identifier.schema,
            hash,
            ticks,
            &ctx.request.song_name,
            &ctx.request.composer_name,
        )?;

        ctx.logger.success(&format!("Identifier: {}", id));
        ctx.progress.set_percent(100);
        ctx.progress
            .set_status(format!("Use /editor create {} to create the chart", id));
        state.identifier = Some(id);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.identifier.is_none() {
            return Err(StepError::invalid_output("Identifier not recorded"));
        }
        Ok(())
    }
}
