//! Upload step.

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobPhase, JobState, StepOutcome};
use crate::upload::UploadError;

/// Uploads the full pack, then every charter pack.
///
/// Charter uploads need the hash returned for the full pack, so none of
/// them starts before the full upload succeeded. They then run
/// concurrently and all settle before any failure is reported.
pub struct UploadStep;

impl UploadStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UploadStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for UploadStep {
    fn name(&self) -> &str {
        "Upload"
    }

    fn description(&self) -> &str {
        "Uploading resource packs"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::UploadingFull
    }

    fn is_numbered(&self) -> bool {
        false
    }

    fn applies_to(&self, ctx: &Context) -> bool {
        ctx.uploads_enabled()
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.archives.is_none() {
            return Err(StepError::invalid_input("No archives to upload"));
        }
        if ctx.access_key().is_empty() {
            return Err(UploadError::MissingCredential.into());
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let uploader = ctx
            .uploader
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("Uploads are disabled"))?;
        // Blobs are reference counted; the copy keeps `state` free for the
        // phase change below.
        let archives = state
            .archives
            .clone()
            .ok_or_else(|| StepError::invalid_input("No archives to upload"))?;
        let key = ctx.access_key();
        let part_count = archives.charter_count();

        let hash = uploader
            .upload_full(key, &archives.full, part_count as u32)
            .await?;
        ctx.logger
            .info(&format!("Uploaded {} (hash {})", archives.full.file_name, hash));
        ctx.progress.set_percent(50);

        state.transition(JobPhase::UploadingParts)?;

        let mut pending: FuturesUnordered<_> = archives
            .charters
            .iter()
            .enumerate()
            .map(|(i, blob)| {
                let part = blob.kind.part().unwrap_or(i as u32 + 1);
                let hash = hash.as_str();
                async move { (part, uploader.upload_charter(key, blob, part, hash).await) }
            })
            .collect();

        let mut completed = 0usize;
        let mut failures = Vec::new();
        while let Some((part, result)) = pending.next().await {
            completed += 1;
            match result {
                Ok(()) => ctx.logger.debug(&format!("Uploaded part-{}", part)),
                Err(e) => {
                    ctx.logger.error(&format!("part-{} upload failed: {}", part, e));
                    failures.push((part, e));
                }
            }
            ctx.progress.set_detail(format!("{}/{}", completed, part_count));
            ctx.progress
                .report_within(50.0, 50.0, completed as f64 / part_count as f64);
        }
        drop(pending);

        state.hash = Some(hash);
        if let Some((part, error)) = failures.into_iter().min_by_key(|(part, _)| *part) {
            ctx.logger.error(&format!("First failed charter: part-{}", part));
            return Err(error.into());
        }

        ctx.logger
            .success(&format!("Uploaded full pack and {} charter pack(s)", part_count));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match state.hash.as_deref() {
            Some(hash) if !hash.is_empty() => Ok(()),
            _ => Err(StepError::invalid_output("No pack hash recorded")),
        }
    }
}
