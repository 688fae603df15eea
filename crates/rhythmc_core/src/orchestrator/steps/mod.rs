//! Pipeline step implementations.

mod archive;
mod assemble;
mod convert;
mod encode;
mod engine_ready;
mod probe_duration;
mod process_audio;
mod upload;

pub use archive::ArchiveStep;
pub use assemble::AssemblePacksStep;
pub use convert::ConvertStep;
pub use encode::EncodeStep;
pub use engine_ready::EngineReadyStep;
pub use probe_duration::ProbeDurationStep;
pub use process_audio::ProcessAudioStep;
pub use upload::UploadStep;

use crate::engine::EngineObserver;

use super::types::Context;

/// Routes engine output into the job log and one slice of the stage bar.
struct StageObserver<'a> {
    ctx: &'a Context,
    base: f64,
    weight: f64,
}

impl<'a> StageObserver<'a> {
    fn new(ctx: &'a Context, base: f64, weight: f64) -> Self {
        Self { ctx, base, weight }
    }
}

impl EngineObserver for StageObserver<'_> {
    fn on_command(&self, command: &str) {
        self.ctx.logger.command(command);
    }

    fn on_output(&self, line: &str) {
        self.ctx.logger.output_line(line);
    }

    fn on_progress(&self, fraction: f64) {
        self.ctx.progress.report_within(self.base, self.weight, fraction);
    }
}
