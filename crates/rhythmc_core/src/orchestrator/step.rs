//! Pipeline step trait definition.

use async_trait::async_trait;

use super::errors::StepResult;
use super::types::{Context, JobPhase, JobState, StepOutcome};

/// Trait for pipeline steps.
///
/// The pipeline runner calls, for every step that applies to the job:
///
/// 1. `validate_input` - check that earlier steps left what this one needs
/// 2. `execute` - do the work and record results in `JobState`
/// 3. `validate_output` - verify the recorded results
///
/// Before `validate_input` the job moves to the step's [`JobPhase`] and, if
/// the step starts a stage, its progress bar is reset.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Step name, used as `<name> failed: …` in failure messages.
    fn name(&self) -> &str;

    /// Phase the job is in while this step runs.
    fn phase(&self) -> JobPhase;

    /// Whether the step shows up in the `(step/total)` counter.
    fn is_numbered(&self) -> bool {
        true
    }

    /// Whether the step begins a new progress stage.
    fn starts_stage(&self) -> bool {
        true
    }

    /// Whether the step runs for this job at all.
    ///
    /// Steps that do not apply are neither run nor counted.
    fn applies_to(&self, _ctx: &Context) -> bool {
        true
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Status text shown while the step runs.
    fn description(&self) -> &str {
        self.name()
    }
}
