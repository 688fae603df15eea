//! Audio processing step: primary render, segmentation, cover art.

use async_trait::async_trait;

use crate::engine::SegmentStream;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobPhase, JobState, StepOutcome};

use super::StageObserver;

/// Share of the stage bar given to the primary render.
const RENDER_WEIGHT: f64 = 60.0;
/// Share given to segmentation.
const SEGMENT_WEIGHT: f64 = 35.0;

/// Renders the full-pack audio and splits the input into segments.
///
/// When no thumbnail was supplied, embedded cover art of the original
/// input is used instead if there is any. Cover extraction never fails
/// the job.
pub struct ProcessAudioStep;

impl ProcessAudioStep {
    pub fn new() -> Self {
        Self
    }

    async fn resolve_thumbnail(&self, ctx: &Context, state: &mut JobState) {
        if let Some(thumbnail) = &ctx.request.thumbnail {
            state.thumbnail = Some(thumbnail.clone());
            return;
        }
        if !ctx.settings.engine.extract_cover_art {
            return;
        }
        let Ok(original) = ctx.input_path() else {
            return;
        };

        match ctx.engine.extract_cover(original, &ctx.work_dir).await {
            Ok(Some(cover)) => {
                ctx.logger
                    .info(&format!("Using embedded cover art ({} bytes)", cover.len()));
                state.thumbnail = Some(cover);
            }
            Ok(None) => ctx.logger.debug("No embedded cover art"),
            Err(e) => ctx
                .logger
                .warn(&format!("Cover art extraction failed, continuing without: {}", e)),
        }
    }
}

impl Default for ProcessAudioStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for ProcessAudioStep {
    fn name(&self) -> &str {
        "Audio processing"
    }

    fn description(&self) -> &str {
        "Processing audio"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::Transcoding
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.source.is_some() {
            return Ok(());
        }
        if ctx.request.needs_conversion() {
            return Err(StepError::invalid_input("Input was not converted"));
        }
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
        let input = match &state.source {
            Some(path) => path.clone(),
            None => ctx.input_path()?.clone(),
        };

        let observer = StageObserver::new(ctx, 0.0, RENDER_WEIGHT);
        let primary = ctx
            .engine
            .render_primary(&input, &ctx.work_dir, &observer)
            .await?;
        ctx.logger.info(&format!(
            "Rendered primary audio: {} bytes",
            primary.bytes.len()
        ));
        ctx.progress.set_percent(RENDER_WEIGHT as u32);

        let segment_seconds = ctx.settings.engine.segment_seconds.max(1);
        let observer = StageObserver::new(ctx, RENDER_WEIGHT, SEGMENT_WEIGHT);
        let source = ctx
            .engine
            .segment(&input, &ctx.work_dir, segment_seconds, &observer)
            .await?;
        ctx.logger
            .info(&format!("Segmented input into {}s pieces", segment_seconds));
        ctx.progress
            .set_percent((RENDER_WEIGHT + SEGMENT_WEIGHT) as u32);

        state.primary = Some(primary);
        state.segments = Some(SegmentStream::new(source));
        if state.source.is_none() {
            state.source = Some(input);
        }

        self.resolve_thumbnail(ctx, state).await;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.primary {
            Some(primary) if !primary.bytes.is_empty() => {}
            Some(_) => return Err(StepError::invalid_output("Primary audio is empty")),
            None => return Err(StepError::invalid_output("Primary audio not recorded")),
        }
        if state.segments.is_none() {
            return Err(StepError::invalid_output("Segments not recorded"));
        }
        Ok(())
    }
}
