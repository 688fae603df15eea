//! Pack assembly step.

use async_trait::async_trait;

use crate::models::{PackKind, PackSet, CHARTER_AUDIO_PATH, META_PATH, THUMBNAIL_PATH};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobPhase, JobState, StepOutcome};
use crate::pack::PackAssembler;

/// Builds the full pack and one charter pack per segment.
///
/// Segments are pulled from index 0 upward; the first missing index ends
/// enumeration. Segment `i` becomes part `i + 1`.
pub struct AssemblePacksStep;

impl AssemblePacksStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AssemblePacksStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for AssemblePacksStep {
    fn name(&self) -> &str {
        "Pack assembly"
    }

    fn description(&self) -> &str {
        "Generating resource packs"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::AssemblingPacks
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.primary.is_none() {
            return Err(StepError::invalid_input("No primary audio"));
        }
        if state.segments.is_none() {
            return Err(StepError::invalid_input("No segment stream"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let primary = state
            .primary
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("No primary audio"))?;

        let assembler = PackAssembler::new(
            &ctx.request.song_name,
            &ctx.request.composer_name,
            state.thumbnail.clone(),
        );

        let mut packs = PackSet::new(assembler.assemble(PackKind::Full, primary.bytes.clone()));
        ctx.progress.set_percent(10);
        if assembler.has_thumbnail() {
            ctx.logger.info("Thumbnail included as pack.png");
        }
        ctx.progress.set_percent(30);

        let segments = state
            .segments
            .as_mut()
            .ok_or_else(|| StepError::invalid_input("No segment stream"))?;
        while let Some(segment) = segments.next().await? {
            let part = segment.part();
            packs.push_charter(assembler.assemble(PackKind::Charter { part }, segment.data));
            ctx.progress.set_detail(format!("part-{}", part));
        }
        ctx.progress.set_percent(60);

        ctx.logger.info(&format!(
            "Assembled full pack and {} charter pack(s)",
            packs.charter_count()
        ));
        state.packs = Some(packs);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let packs = state
            .packs
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Packs not recorded"))?;

        for pack in packs.iter() {
            if pack.audio().is_none() || !pack.contains(META_PATH) {
                return Err(StepError::invalid_output(format!(
                    "{} is missing required files",
                    pack.kind()
                )));
            }
            if pack.contains(THUMBNAIL_PATH) != state.thumbnail.is_some() {
                return Err(StepError::invalid_output(format!(
                    "{} thumbnail does not match the job",
                    pack.kind()
                )));
            }
        }
        if packs.full().contains(CHARTER_AUDIO_PATH) {
            return Err(StepError::invalid_output("Full pack contains charter audio"));
        }
        Ok(())
    }
}
