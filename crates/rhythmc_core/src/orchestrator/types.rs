//! Core types for the orchestrator pipeline.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

use crate::archive::ArchiveBuilder;
use crate::config::Settings;
use crate::engine::{AudioEngine, EngineGate, PrimaryAudio, SegmentStream};
use crate::logging::JobLogger;
use crate::models::{ArchiveBlob, JobRequest, PackSet};
use crate::upload::PackUploader;

use super::errors::{StepError, StepResult};
use super::progress::ProgressReporter;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    Idle,
    AwaitingEngineReady,
    Transcoding,
    ProbingDuration,
    AssemblingPacks,
    Archiving,
    UploadingFull,
    UploadingParts,
    Encoding,
    Done,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Done | JobPhase::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Archiving -> Done` is the dry-run exit; `Failed` is reachable from
    /// every non-terminal phase.
    pub fn can_transition_to(&self, next: JobPhase) -> bool {
        use JobPhase::*;

        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, AwaitingEngineReady)
                | (AwaitingEngineReady, Transcoding)
                | (Transcoding, ProbingDuration)
                | (ProbingDuration, AssemblingPacks)
                | (AssemblingPacks, Archiving)
                | (Archiving, UploadingFull)
                | (Archiving, Done)
                | (UploadingFull, UploadingParts)
                | (UploadingParts, Encoding)
                | (Encoding, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::AwaitingEngineReady => "awaiting-engine",
            JobPhase::Transcoding => "transcoding",
            JobPhase::ProbingDuration => "probing-duration",
            JobPhase::AssemblingPacks => "assembling-packs",
            JobPhase::Archiving => "archiving",
            JobPhase::UploadingFull => "uploading-full",
            JobPhase::UploadingParts => "uploading-parts",
            JobPhase::Encoding => "encoding",
            JobPhase::Done => "done",
            JobPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only context passed to pipeline steps.
///
/// Contains the request, settings and collaborators that steps can read
/// but not modify. Mutable state goes in `JobState`.
pub struct Context {
    pub request: JobRequest,
    pub settings: Settings,
    pub job_id: String,
    /// Job-specific working directory (under temp_root).
    pub work_dir: PathBuf,
    /// Where finished archives are copied, if requested.
    pub export_dir: Option<PathBuf>,
    pub logger: Arc<JobLogger>,
    pub progress: ProgressReporter,
    pub engine: Arc<dyn AudioEngine>,
    pub gate: Arc<EngineGate>,
    pub archiver: Arc<dyn ArchiveBuilder>,
    /// `None` in a dry run.
    pub uploader: Option<Arc<dyn PackUploader>>,
}

impl Context {
    /// Whether packs will be uploaded and an identifier produced.
    pub fn uploads_enabled(&self) -> bool {
        self.uploader.is_some()
    }

    /// The access key, trimmed. Empty when none was given.
    pub fn access_key(&self) -> &str {
        self.request.access_key.as_deref().map(str::trim).unwrap_or("")
    }

    /// Original input file.
    pub fn input_path(&self) -> StepResult<&PathBuf> {
        self.request
            .audio_path
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("No audio file selected"))
    }
}

/// Archives produced by the archiving step.
#[derive(Debug, Clone)]
pub struct ArchiveOutput {
    pub full: ArchiveBlob,
    /// Ordered by part number.
    pub charters: Vec<ArchiveBlob>,
}

impl ArchiveOutput {
    pub fn iter(&self) -> impl Iterator<Item = &ArchiveBlob> {
        std::iter::once(&self.full).chain(self.charters.iter())
    }

    pub fn charter_count(&self) -> usize {
        self.charters.len()
    }
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// Write-once manifest: each step fills in its own fields and later steps
/// only read them.
#[derive(Debug)]
pub struct JobState {
    pub job_id: String,
    pub started_at: String,
    phase: JobPhase,
    /// Input for processing: the original file or its converted copy.
    pub source: Option<PathBuf>,
    pub primary: Option<PrimaryAudio>,
    pub segments: Option<SegmentStream>,
    /// Supplied thumbnail or extracted cover art.
    pub thumbnail: Option<Bytes>,
    pub duration_ticks: Option<u64>,
    pub packs: Option<PackSet>,
    pub archives: Option<ArchiveOutput>,
    pub saved_archives: Vec<PathBuf>,
    pub hash: Option<String>,
    pub identifier: Option<String>,
}

impl JobState {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: chrono::Local::now().to_rfc3339(),
            phase: JobPhase::Idle,
            source: None,
            primary: None,
            segments: None,
            thumbnail: None,
            duration_ticks: None,
            packs: None,
            archives: None,
            saved_archives: Vec::new(),
            hash: None,
            identifier: None,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Move to `next`. Staying in the current phase is a no-op.
    pub fn transition(&mut self, next: JobPhase) -> StepResult<()> {
        if self.phase == next {
            return Ok(());
        }
        if !self.phase.can_transition_to(next) {
            return Err(StepError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        tracing::debug!("Job {}: {} -> {}", self.job_id, self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Mark the job failed. A terminal phase is left alone.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = JobPhase::Failed;
        }
    }

    pub fn charter_count(&self) -> usize {
        self.packs.as_ref().map(PackSet::charter_count).unwrap_or(0)
    }
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        let mut state = JobState::new("job");
        for next in [
            JobPhase::AwaitingEngineReady,
            JobPhase::Transcoding,
            JobPhase::ProbingDuration,
            JobPhase::AssemblingPacks,
            JobPhase::Archiving,
            JobPhase::UploadingFull,
            JobPhase::UploadingParts,
            JobPhase::Encoding,
            JobPhase::Done,
        ] {
            state.transition(next).unwrap();
        }
        assert_eq!(state.phase(), JobPhase::Done);
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let mut state = JobState::new("job");
        let err = state.transition(JobPhase::Archiving).unwrap_err();
        assert!(matches!(
            err,
            StepError::InvalidTransition {
                from: JobPhase::Idle,
                to: JobPhase::Archiving
            }
        ));
        assert_eq!(state.phase(), JobPhase::Idle);
    }

    #[test]
    fn failed_is_reachable_until_terminal() {
        for phase in [JobPhase::Idle, JobPhase::Transcoding, JobPhase::UploadingParts] {
            assert!(phase.can_transition_to(JobPhase::Failed));
        }
        assert!(!JobPhase::Done.can_transition_to(JobPhase::Failed));
        assert!(!JobPhase::Failed.can_transition_to(JobPhase::Idle));
    }

    #[test]
    fn dry_run_may_finish_after_archiving() {
        assert!(JobPhase::Archiving.can_transition_to(JobPhase::Done));
        assert!(!JobPhase::AssemblingPacks.can_transition_to(JobPhase::Done));
    }

    #[test]
    fn fail_keeps_terminal_phase() {
        let mut state = JobState::new("job");
        state.fail();
        assert_eq!(state.phase(), JobPhase::Failed);
        state.fail();
        assert_eq!(state.phase(), JobPhase::Failed);
    }
}
