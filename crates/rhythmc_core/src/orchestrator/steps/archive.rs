//! Archiving step.

use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::archive::{ArchiveBuilder, ArchiveError, ArchiveResult};
use crate::models::{export_file_name, ArchiveBlob, Pack};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{ArchiveOutput, Context, JobPhase, JobState, StepOutcome};

/// Zips every pack.
///
/// The full archive is built first, then all charter archives at once on
/// the blocking pool. Every task is awaited before any result is looked
/// at; one failure fails the whole batch.
pub struct ArchiveStep;

impl ArchiveStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ArchiveStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Build one archive on the blocking pool.
async fn build_blocking(
    archiver: Arc<dyn ArchiveBuilder>,
    pack: Pack,
    file_name: String,
) -> ArchiveResult<ArchiveBlob> {
    let name = file_name.clone();
    tokio::task::spawn_blocking(move || archiver.build(&pack, &file_name))
        .await
        .map_err(|e| ArchiveError::TaskFailed {
            name,
            message: e.to_string(),
        })?
}

async fn export(dir: &Path, archives: &ArchiveOutput) -> StepResult<Vec<std::path::PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StepError::io_error("creating export directory", e))?;

    let mut saved = Vec::with_capacity(archives.charter_count() + 1);
    for blob in archives.iter() {
        let file_name = export_file_name(&blob.file_name);
        let mut components = Path::new(&file_name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(StepError::precondition_failed(format!(
                "Cannot save archive as '{}'",
                blob.file_name
            )));
        }
        let path = dir.join(file_name);
        tokio::fs::write(&path, &blob.data)
            .await
            .map_err(|e| StepError::io_error(format!("writing {}", path.display()), e))?;
        saved.push(path);
    }
    Ok(saved)
}

#[async_trait]
impl PipelineStep for ArchiveStep {
    fn name(&self) -> &str {
        "Archiving"
    }

    fn description(&self) -> &str {
        "Creating ZIP files"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::Archiving
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.packs.is_none() {
            return Err(StepError::invalid_input("No packs to archive"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let packs = state
            .packs
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("No packs to archive"))?;
        let song = ctx.request.song_name.as_str();
        let total = packs.charter_count() + 1;

        let full_pack = packs.full().clone();
        let full_name = full_pack.kind().archive_name(song);
        let full = build_blocking(ctx.archiver.clone(), full_pack, full_name).await?;
        ctx.logger
            .info(&format!("{}: {} bytes, md5 {}", full.file_name, full.len(), full.md5));
        ctx.progress.report_within(0.0, 100.0, 1.0 / total as f64);

        let mut pending: FuturesUnordered<_> = packs
            .charters()
            .iter()
            .map(|pack| {
                let part = pack.kind().part().unwrap_or(0);
                let name = pack.kind().archive_name(song);
                let task = build_blocking(ctx.archiver.clone(), pack.clone(), name);
                async move { (part, task.await) }
            })
            .collect();

        let charter_count = packs.charter_count();
        let mut slots: Vec<Option<ArchiveResult<ArchiveBlob>>> =
            (0..charter_count).map(|_| None).collect();
        let mut completed = 1;
        while let Some((part, result)) = pending.next().await {
            completed += 1;
            if let Some(slot) = (part as usize).checked_sub(1).and_then(|i| slots.get_mut(i)) {
                *slot = Some(result);
            }
            ctx.progress.set_detail(format!("{}/{}", completed - 1, charter_count));
            ctx.progress
                .report_within(0.0, 100.0, completed as f64 / total as f64);
        }

        let mut charters = Vec::with_capacity(charter_count);
        for (i, slot) in slots.into_iter().enumerate() {
            let blob = slot
                .ok_or_else(|| StepError::precondition_failed(format!("part-{} was not archived", i + 1)))??;
            ctx.logger
                .info(&format!("{}: {} bytes, md5 {}", blob.file_name, blob.len(), blob.md5));
            charters.push(blob);
        }

        let archives = ArchiveOutput { full, charters };
        if let Some(dir) = &ctx.export_dir {
            state.saved_archives = export(dir, &archives).await?;
            ctx.logger.info(&format!(
                "Saved {} archive(s) to {}",
                state.saved_archives.len(),
                dir.display()
            ));
        }
        state.archives = Some(archives);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let archives = state
            .archives
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Archives not recorded"))?;
        if archives.charter_count() != state.charter_count() {
            return Err(StepError::invalid_output(format!(
                "{} charter archives for {} charter packs",
                archives.charter_count(),
                state.charter_count()
            )));
        }
        if archives.iter().any(ArchiveBlob::is_empty) {
            return Err(StepError::invalid_output("Empty archive"));
        }
        Ok(())
    }
}
