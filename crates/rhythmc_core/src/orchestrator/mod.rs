//! Pipeline orchestrator for coordinating job execution.
//!
//! A job is a fixed sequence of steps. Each step validates what earlier
//! steps recorded, does its work and records its own output in
//! [`JobState`].
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::submit
//!     ├── entry guard (names, audio file)
//!     ├── authorization (GET /api/verify)
//!     └── Pipeline
//!         ├── Step: Engine           AwaitingEngineReady
//!         ├── Step: Conversion       Transcoding        (non-Ogg input only)
//!         ├── Step: Audio processing Transcoding
//!         ├── Step: Duration probe   ProbingDuration
//!         ├── Step: Pack assembly    AssemblingPacks
//!         ├── Step: Archiving        Archiving
//!         ├── Step: Upload           UploadingFull → UploadingParts
//!         └── Step: Encoding         Encoding
//! ```
//!
//! Upload and encoding are skipped when uploads are disabled; the job then
//! finishes after archiving.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rhythmc_core::engine::FfmpegEngine;
//! use rhythmc_core::orchestrator::Orchestrator;
//!
//! let engine = Arc::new(FfmpegEngine::new(settings.engine.clone()));
//! let orchestrator = Orchestrator::new(settings, engine, Some(uploader));
//! let result = orchestrator.submit(request).await;
//! println!("{:?}", result.identifier);
//! ```

mod errors;
mod job;
mod pipeline;
mod progress;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use job::{
    validate_request, JobResult, Orchestrator, SharedLineCallback, SharedProgressCallback,
};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use progress::{weighted_percent, ProgressCallback, ProgressReporter, ProgressSnapshot};
pub use step::PipelineStep;
pub use steps::{
    ArchiveStep, AssemblePacksStep, ConvertStep, EncodeStep, EngineReadyStep, ProbeDurationStep,
    ProcessAudioStep, UploadStep,
};
pub use types::{ArchiveOutput, Context, JobPhase, JobState, StepOutcome};

/// Create the standard pipeline with all steps in order.
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(EngineReadyStep::new())
        .with_step(ConvertStep::new())
        .with_step(ProcessAudioStep::new())
        .with_step(ProbeDurationStep::new())
        .with_step(AssemblePacksStep::new())
        .with_step(ArchiveStep::new())
        .with_step(UploadStep::new())
        .with_step(EncodeStep::new())
}
