//! Job entry point: one request in, one [`JobResult`] out.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::archive::{ArchiveBuilder, ZipArchiveBuilder};
use crate::config::Settings;
use crate::engine::{AudioEngine, EngineGate};
use crate::logging::{JobLogger, LineCallback};
use crate::models::JobRequest;
use crate::upload::{PackUploader, UploadError};

use super::create_standard_pipeline;
use super::errors::PipelineError;
use super::pipeline::{CancelHandle, PipelineRunResult};
use super::progress::{ProgressCallback, ProgressReporter};
use super::types::{Context, JobPhase, JobState};

/// Shared line sink for job log output.
pub type SharedLineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Shared progress sink. Arguments: (stage_label, percent, status_line)
pub type SharedProgressCallback = Arc<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Result of processing a single job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub success: bool,
    /// Final phase: `Done`, `Failed`, or `Idle` for a rejected request.
    pub phase: JobPhase,
    /// Set when packs were uploaded.
    pub identifier: Option<String>,
    /// Single user-facing failure message.
    pub error: Option<String>,
    pub hash: Option<String>,
    pub duration_ticks: Option<u64>,
    pub charter_count: usize,
    /// `(archive name, md5)` in part order, full pack first.
    pub archive_digests: Vec<(String, String)>,
    pub saved_archives: Vec<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub total_steps: u32,
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
}

impl JobResult {
    fn from_state(state: &JobState, log_path: Option<PathBuf>) -> Self {
        Self {
            job_id: state.job_id.clone(),
            success: false,
            phase: state.phase(),
            identifier: state.identifier.clone(),
            error: None,
            hash: state.hash.clone(),
            duration_ticks: state.duration_ticks,
            charter_count: state.charter_count(),
            archive_digests: state
                .archives
                .as_ref()
                .map(|a| a.iter().map(|b| (b.file_name.clone(), b.md5.clone())).collect())
                .unwrap_or_default(),
            saved_archives: state.saved_archives.clone(),
            log_path,
            total_steps: 0,
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        }
    }

    pub fn success(state: &JobState, log_path: PathBuf, run: PipelineRunResult) -> Self {
        Self {
            success: true,
            total_steps: run.total_steps,
            steps_completed: run.steps_completed,
            steps_skipped: run.steps_skipped,
            ..Self::from_state(state, Some(log_path))
        }
    }

    pub fn failure(state: &JobState, log_path: Option<PathBuf>, error: &PipelineError) -> Self {
        Self {
            identifier: None,
            error: Some(error.to_string()),
            ..Self::from_state(state, log_path)
        }
    }

    /// Whether the run stopped after archiving without uploading.
    pub fn is_dry_run(&self) -> bool {
        self.success && self.identifier.is_none()
    }
}

/// Runs jobs one at a time against shared collaborators.
///
/// The engine gate is the only state shared between jobs; everything else
/// lives for one job. Submitting while a job is running is rejected.
pub struct Orchestrator {
    settings: Settings,
    engine: Arc<dyn AudioEngine>,
    gate: Arc<EngineGate>,
    archiver: Arc<dyn ArchiveBuilder>,
    uploader: Option<Arc<dyn PackUploader>>,
    busy: AtomicBool,
    cancel: CancelHandle,
    log_callback: Option<SharedLineCallback>,
    progress_callback: Option<SharedProgressCallback>,
}

impl Orchestrator {
    /// `uploader` may be `None` when uploads are disabled in `settings`.
    pub fn new(
        settings: Settings,
        engine: Arc<dyn AudioEngine>,
        uploader: Option<Arc<dyn PackUploader>>,
    ) -> Self {
        Self {
            settings,
            engine,
            gate: Arc::new(EngineGate::new()),
            archiver: Arc::new(ZipArchiveBuilder::new()),
            uploader,
            busy: AtomicBool::new(false),
            cancel: CancelHandle::new(),
            log_callback: None,
            progress_callback: None,
        }
    }

    /// Share an engine gate with other orchestrators.
    pub fn with_gate(mut self, gate: Arc<EngineGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn ArchiveBuilder>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn with_log_callback(mut self, callback: SharedLineCallback) -> Self {
        self.log_callback = Some(callback);
        self
    }

    pub fn with_progress_callback(mut self, callback: SharedProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn gate(&self) -> &Arc<EngineGate> {
        &self.gate
    }

    /// Uploads need both the setting and an uploader.
    pub fn uploads_enabled(&self) -> bool {
        self.settings.backend.upload && self.uploader.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Cancels the running job at its next step boundary.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run one job to completion.
    ///
    /// Never panics on job errors; every failure ends up in
    /// [`JobResult::error`].
    pub async fn submit(&self, request: JobRequest) -> JobResult {
        let job_id = new_job_id();
        let state = JobState::new(&job_id);

        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            tracing::warn!("Rejected job {}: another job is running", job_id);
            return JobResult::failure(&state, None, &PipelineError::Busy);
        };
        self.cancel.reset();

        if let Err(message) = validate_request(&request) {
            tracing::warn!("Rejected job {}: {}", job_id, message);
            let error = PipelineError::validation_failed(&job_id, message);
            return JobResult::failure(&state, None, &error);
        }

        self.run_job(job_id, state, request).await
    }

    async fn run_job(&self, job_id: String, mut state: JobState, request: JobRequest) -> JobResult {
        let callback = self.log_callback.clone().map(|cb| {
            Box::new(move |line: &str| cb(line)) as LineCallback
        });
        let logger = match JobLogger::new(
            &job_id,
            &self.settings.paths.logs_folder,
            self.settings.logging.to_log_config(),
            callback,
        ) {
            Ok(logger) => Arc::new(logger),
            Err(e) => {
                state.fail();
                let error =
                    PipelineError::setup_failed(&job_id, format!("Failed to create log file: {}", e));
                return JobResult::failure(&state, None, &error);
            }
        };
        let log_path = logger.log_path().to_path_buf();

        logger.info(&format!(
            "Job {}: '{}' by '{}'",
            job_id, request.song_name, request.composer_name
        ));

        let uploads = self.uploads_enabled();
        if uploads {
            if let Err(e) = self.authorize(&request).await {
                state.fail();
                let error = PipelineError::unauthorized(&job_id, e);
                logger.error(&error.to_string());
                logger.close();
                return JobResult::failure(&state, Some(log_path), &error);
            }
            logger.validation("Access key accepted");
        } else {
            logger.info("Uploads disabled, packs will only be archived");
        }

        let work_dir = Path::new(&self.settings.paths.temp_root).join(&job_id);
        if let Err(e) = tokio::fs::create_dir_all(&work_dir).await {
            state.fail();
            let error = PipelineError::setup_failed(
                &job_id,
                format!("Failed to create work directory {}: {}", work_dir.display(), e),
            );
            logger.error(&error.to_string());
            logger.close();
            return JobResult::failure(&state, Some(log_path), &error);
        }

        let mut progress = ProgressReporter::new().with_logger(logger.clone());
        if let Some(cb) = self.progress_callback.clone() {
            let callback: ProgressCallback =
                Box::new(move |stage: &str, pct: u32, status: &str| cb(stage, pct, status));
            progress = progress.with_callback(callback);
        }

        let ctx = Context {
            export_dir: request.export_dir.clone(),
            request,
            settings: self.settings.clone(),
            job_id: job_id.clone(),
            work_dir: work_dir.clone(),
            logger: logger.clone(),
            progress,
            engine: self.engine.clone(),
            gate: self.gate.clone(),
            archiver: self.archiver.clone(),
            uploader: if uploads { self.uploader.clone() } else { None },
        };

        let pipeline = create_standard_pipeline().with_cancel_handle(&self.cancel);
        let outcome = pipeline.run(&ctx, &mut state).await;

        let result = match outcome {
            Ok(run) => {
                if let Some(id) = &state.identifier {
                    logger.success(&format!("Use /editor create {} to create the chart.", id));
                } else {
                    logger.success("Packs archived, upload skipped");
                }
                JobResult::success(&state, log_path, run)
            }
            Err(error) => {
                state.fail();
                logger.error(&error.to_string());
                logger.show_tail("tool output");
                JobResult::failure(&state, Some(log_path), &error)
            }
        };

        drop(ctx);
        if self.settings.paths.keep_work_dir {
            logger.info(&format!("Work directory kept at {}", work_dir.display()));
        } else if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
            logger.warn(&format!("Failed to remove {}: {}", work_dir.display(), e));
        }
        logger.close();

        result
    }

    /// Check the access key against the backend.
    async fn authorize(&self, request: &JobRequest) -> Result<(), UploadError> {
        let key = request.access_key.as_deref().map(str::trim).unwrap_or("");
        if key.is_empty() {
            return Err(UploadError::MissingCredential);
        }
        match &self.uploader {
            Some(uploader) => uploader.verify(key).await,
            None => Err(UploadError::MissingCredential),
        }
    }
}

/// Clears the busy flag when the job ends, however it ends.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Entry guard: both names and an existing audio file.
pub fn validate_request(request: &JobRequest) -> Result<(), String> {
    if request.song_name.trim().is_empty() || request.composer_name.trim().is_empty() {
        return Err("Please enter both a song name and a composer name".to_string());
    }
    match &request.audio_path {
        None => Err("Please select an audio file".to_string()),
        Some(path) if !path.is_file() => {
            Err(format!("Audio file not found: {}", path.display()))
        }
        Some(_) => Ok(()),
    }
}

fn new_job_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn names_are_required() {
        let dir = tempdir().unwrap();
        let audio = dir.path().join("a.ogg");
        std::fs::write(&audio, b"OggS").unwrap();

        assert!(validate_request(&JobRequest::new(&audio, "Test", "Case")).is_ok());
        assert!(validate_request(&JobRequest::new(&audio, "  ", "Case")).is_err());
        assert!(validate_request(&JobRequest::new(&audio, "Test", "")).is_err());
    }

    #[test]
    fn audio_file_is_required() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.ogg");
        let err = validate_request(&JobRequest::new(&missing, "Test", "Case")).unwrap_err();
        assert!(err.contains("not found"));

        let request = JobRequest {
            song_name: "Test".into(),
            composer_name: "Case".into(),
            ..JobRequest::default()
        };
        assert!(validate_request(&request).is_err());
    }

    #[test]
    fn busy_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let guard = BusyGuard::acquire(&flag).unwrap();
        assert!(BusyGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(BusyGuard::acquire(&flag).is_some());
    }

    #[test]
    fn job_ids_are_short_hex() {
        let id = new_job_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
