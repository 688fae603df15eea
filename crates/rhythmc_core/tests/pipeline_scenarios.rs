//! End-to-end pipeline runs against in-memory collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rhythmc_core::archive::{ArchiveBuilder, ArchiveError, ArchiveResult, ZipArchiveBuilder};
use rhythmc_core::config::Settings;
use rhythmc_core::engine::{
    AudioEngine, EngineError, EngineObserver, EngineResult, GateState, MemorySegmentSource,
    PrimaryAudio, SegmentSource,
};
use rhythmc_core::identifier::{self, IdentifierSchema};
use rhythmc_core::models::{ArchiveBlob, JobRequest, Pack, PackKind, THUMBNAIL_PATH};
use rhythmc_core::orchestrator::{JobPhase, Orchestrator};
use rhythmc_core::upload::{HttpUploader, PackUploader, UploadError, UploadResult};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeEngine {
    duration: f64,
    segments: Vec<Bytes>,
    cover: Option<Bytes>,
    load_delay: Duration,
    queried: Arc<Mutex<Vec<u32>>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeEngine {
    fn new(duration: f64, segments: usize) -> Self {
        Self {
            duration,
            segments: (0..segments)
                .map(|i| Bytes::from(format!("segment-{i}")))
                .collect(),
            cover: None,
            load_delay: Duration::ZERO,
            queried: Arc::new(Mutex::new(Vec::new())),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }
}

struct RecordingSource {
    inner: MemorySegmentSource,
    queried: Arc<Mutex<Vec<u32>>>,
}

#[async_trait]
impl SegmentSource for RecordingSource {
    async fn fetch(&mut self, index: u32) -> EngineResult<Option<Bytes>> {
        self.queried.lock().push(index);
        self.inner.fetch(index).await
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn load(&self) -> EngineResult<()> {
        self.calls.lock().push("load");
        tokio::time::sleep(self.load_delay).await;
        Ok(())
    }

    async fn convert(
        &self,
        _input: &Path,
        work_dir: &Path,
        observer: &dyn EngineObserver,
    ) -> EngineResult<PathBuf> {
        self.calls.lock().push("convert");
        observer.on_progress(0.5);
        observer.on_progress(1.0);
        let out = work_dir.join("converted.ogg");
        std::fs::write(&out, b"OggS converted")?;
        Ok(out)
    }

    async fn render_primary(
        &self,
        _input: &Path,
        work_dir: &Path,
        observer: &dyn EngineObserver,
    ) -> EngineResult<PrimaryAudio> {
        self.calls.lock().push("render");
        observer.on_output("size=     128kB time=00:00:10.00 bitrate= 104.9kbits/s");
        observer.on_progress(1.0);
        Ok(PrimaryAudio {
            path: work_dir.join("death.ogg"),
            bytes: Bytes::from_static(b"OggS primary"),
        })
    }

    async fn segment(
        &self,
        _input: &Path,
        _work_dir: &Path,
        segment_seconds: u32,
        _observer: &dyn EngineObserver,
    ) -> EngineResult<Box<dyn SegmentSource>> {
        self.calls.lock().push("segment");
        assert_eq!(segment_seconds, 15);
        Ok(Box::new(RecordingSource {
            inner: MemorySegmentSource::from_segments(self.segments.clone()),
            queried: self.queried.clone(),
        }))
    }

    async fn probe_duration(&self, _audio: &Path) -> EngineResult<f64> {
        self.calls.lock().push("probe");
        Ok(self.duration)
    }

    async fn extract_cover(&self, _input: &Path, _work_dir: &Path) -> EngineResult<Option<Bytes>> {
        self.calls.lock().push("cover");
        Ok(self.cover.clone())
    }
}

#[derive(Default)]
struct FakeUploader {
    reject_key: bool,
    fail_full: bool,
    fail_part: Option<u32>,
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl PackUploader for FakeUploader {
    async fn verify(&self, _access_key: &str) -> UploadResult<()> {
        self.events.lock().push("verify".into());
        if self.reject_key {
            return Err(UploadError::Unauthorized { status: 401 });
        }
        Ok(())
    }

    async fn upload_full(
        &self,
        _access_key: &str,
        archive: &ArchiveBlob,
        part_count: u32,
    ) -> UploadResult<String> {
        self.events
            .lock()
            .push(format!("full:{}:{}", archive.file_name, part_count));
        if self.fail_full {
            return Err(UploadError::Status {
                endpoint: "player".into(),
                status: 500,
                body: String::new(),
            });
        }
        Ok("abc123".into())
    }

    async fn upload_charter(
        &self,
        _access_key: &str,
        archive: &ArchiveBlob,
        part: u32,
        hash: &str,
    ) -> UploadResult<()> {
        // Early parts finish last.
        tokio::time::sleep(Duration::from_millis(5 * (4 - part.min(4)) as u64)).await;
        self.events
            .lock()
            .push(format!("charter:{}:{}:{}", part, archive.file_name, hash));
        if self.fail_part == Some(part) {
            return Err(UploadError::Status {
                endpoint: "charter".into(),
                status: 413,
                body: "too large".into(),
            });
        }
        Ok(())
    }
}

/// Records the thumbnail buffer of every pack and finishes early parts last.
#[derive(Default)]
struct RecordingArchiver {
    inner: ZipArchiveBuilder,
    fail_part: Option<u32>,
    thumbnails: Mutex<Vec<(PackKind, Option<usize>)>>,
}

impl ArchiveBuilder for RecordingArchiver {
    fn build(&self, pack: &Pack, file_name: &str) -> ArchiveResult<ArchiveBlob> {
        if let Some(part) = pack.kind().part() {
            std::thread::sleep(Duration::from_millis(5 * (4 - part.min(4)) as u64));
        }
        self.thumbnails.lock().push((
            pack.kind(),
            pack.get(THUMBNAIL_PATH).map(|b| b.as_ptr() as usize),
        ));
        if self.fail_part.is_some() && self.fail_part == pack.kind().part() {
            return Err(ArchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.build(pack, file_name)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    dir: TempDir,
    settings: Settings,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.paths.temp_root = dir.path().join("work").to_string_lossy().into_owned();
        settings.paths.logs_folder = dir.path().join("logs").to_string_lossy().into_owned();
        Self { dir, settings }
    }

    fn audio(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"fake audio").unwrap();
        path
    }

    fn request(&self, name: &str) -> JobRequest {
        JobRequest::new(self.audio(name), "Test", "Case").with_access_key("key")
    }
}

type ProgressLog = Arc<Mutex<Vec<(String, u32, String)>>>;

fn record_progress(orchestrator: Orchestrator) -> (Orchestrator, ProgressLog) {
    let log: ProgressLog = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let callback = move |stage: &str, pct: u32, status: &str| {
        sink.lock().push((stage.to_string(), pct, status.to_string()));
    };
    let orchestrator = orchestrator.with_progress_callback(Arc::new(callback));
    (orchestrator, log)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn canonical_input_without_segments() {
    let harness = Harness::new();
    let engine = Arc::new(FakeEngine::new(32.0, 0));
    let uploader = Arc::new(FakeUploader::default());
    let (orchestrator, progress) = record_progress(Orchestrator::new(
        harness.settings.clone(),
        engine.clone(),
        Some(uploader.clone() as Arc<dyn PackUploader>),
    ));

    let result = orchestrator.submit(harness.request("song.ogg")).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.phase, JobPhase::Done);
    assert_eq!(result.total_steps, 4);
    assert_eq!(result.charter_count, 0);
    assert_eq!(result.duration_ticks, Some(640));
    assert_eq!(result.identifier.as_deref(), Some("abc123:640:VGVzdA=="));

    assert!(!engine.calls().contains(&"convert"));
    assert_eq!(*engine.queried.lock(), vec![0]);
    assert_eq!(
        *uploader.events.lock(),
        vec!["verify".to_string(), "full:Test.zip:0".to_string()]
    );

    let statuses: Vec<String> = progress.lock().iter().map(|(_, _, s)| s.clone()).collect();
    assert!(statuses.iter().any(|s| s.starts_with("(4/4)")));
    assert!(!statuses.iter().any(|s| s.contains("/5)")));
}

#[tokio::test]
async fn converted_input_with_two_segments() {
    let harness = Harness::new();
    let engine = Arc::new(FakeEngine::new(40.0, 2));
    let uploader = Arc::new(FakeUploader::default());
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        engine.clone(),
        Some(uploader.clone() as Arc<dyn PackUploader>),
    );

    let result = orchestrator.submit(harness.request("song.mp3")).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_steps, 5);
    assert_eq!(result.charter_count, 2);
    assert_eq!(result.duration_ticks, Some(800));
    assert_eq!(*engine.queried.lock(), vec![0, 1, 2]);
    assert_eq!(
        engine.calls(),
        vec!["load", "convert", "render", "segment", "cover", "probe"]
    );

    let names: Vec<&str> = result.archive_digests.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Test.zip", "part-1.zip", "part-2.zip"]);

    let events = uploader.events.lock().clone();
    assert_eq!(events[0], "verify");
    assert_eq!(events[1], "full:Test.zip:2");
    let mut charters = events[2..].to_vec();
    charters.sort();
    assert_eq!(
        charters,
        vec!["charter:1:part-1.zip:abc123", "charter:2:part-2.zip:abc123"]
    );
}

#[tokio::test]
async fn full_upload_failure_stops_before_charters() {
    let harness = Harness::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/verify"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/texture/player"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/texture/charter"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let uploader = Arc::new(HttpUploader::new(&server.uri(), None).unwrap());
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(40.0, 2)),
        Some(uploader as Arc<dyn PackUploader>),
    );

    let result = orchestrator.submit(harness.request("song.mp3")).await;

    assert!(!result.success);
    assert_eq!(result.phase, JobPhase::Failed);
    assert!(result.identifier.is_none());
    let error = result.error.unwrap();
    assert!(error.starts_with("Upload failed:"), "{error}");
    assert!(error.contains("500"), "{error}");
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn thumbnail_is_the_same_buffer_in_every_pack() {
    let harness = Harness::new();
    let archiver = Arc::new(RecordingArchiver::default());
    let thumbnail = Bytes::from(vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3]);
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(50.0, 3)),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    )
    .with_archiver(archiver.clone());

    let request = harness.request("song.ogg").with_thumbnail(thumbnail.clone());
    let result = orchestrator.submit(request).await;
    assert!(result.success, "{:?}", result.error);

    let recorded = archiver.thumbnails.lock().clone();
    assert_eq!(recorded.len(), 4);
    for (kind, ptr) in recorded {
        assert_eq!(ptr, Some(thumbnail.as_ptr() as usize), "{kind}");
    }
}

#[tokio::test]
async fn part_order_does_not_depend_on_completion_order() {
    let harness = Harness::new();
    let archiver = Arc::new(RecordingArchiver::default());
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(50.0, 3)),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    )
    .with_archiver(archiver.clone());

    let result = orchestrator.submit(harness.request("song.ogg")).await;
    assert!(result.success, "{:?}", result.error);

    let names: Vec<&str> = result.archive_digests.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["Test.zip", "part-1.zip", "part-2.zip", "part-3.zip"]);
}

#[tokio::test]
async fn progress_stays_in_range_and_resets_per_stage() {
    let harness = Harness::new();
    let (orchestrator, progress) = record_progress(Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(40.0, 2)),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    ));

    let result = orchestrator.submit(harness.request("song.mp3")).await;
    assert!(result.success, "{:?}", result.error);

    let events = progress.lock().clone();
    assert!(!events.is_empty());

    let mut current_stage: Option<String> = None;
    let mut last_pct = 0;
    for (stage, pct, status) in &events {
        assert!(*pct <= 100, "{status}: {pct}");
        if current_stage.as_deref() != Some(stage.as_str()) {
            assert_eq!(*pct, 0, "stage '{stage}' did not start at 0");
            current_stage = Some(stage.clone());
        } else {
            assert!(*pct >= last_pct, "{status} went backwards");
        }
        last_pct = *pct;
    }
    assert_eq!(events.last().map(|e| e.1), Some(100));
}

#[tokio::test]
async fn identifier_round_trips_through_decoder() {
    let mut harness = Harness::new();
    harness.settings.identifier.schema = IdentifierSchema::SongComposer;
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(12.345, 1)),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    );

    let request = JobRequest::new(harness.audio("夜.ogg"), "夜に駆ける", "YOASOBI: live")
        .with_access_key("key");
    let result = orchestrator.submit(request).await;
    let id = result.identifier.expect("identifier");

    let decoded = identifier::decode(IdentifierSchema::SongComposer, &id).unwrap();
    assert_eq!(decoded.hash, "abc123");
    assert_eq!(decoded.duration_ticks, 246);
    assert_eq!(decoded.song_name, "夜に駆ける");
    assert_eq!(decoded.composer_name.as_deref(), Some("YOASOBI: live"));
}

// ---------------------------------------------------------------------------
// Entry guard, authorization and modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_names_are_rejected_in_idle() {
    let harness = Harness::new();
    let engine = Arc::new(FakeEngine::new(32.0, 0));
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        engine.clone(),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    );

    let mut request = harness.request("song.ogg");
    request.composer_name = "   ".into();
    let result = orchestrator.submit(request).await;

    assert!(!result.success);
    assert_eq!(result.phase, JobPhase::Idle);
    assert!(result.error.is_some());
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn rejected_key_stops_before_engine_work() {
    let harness = Harness::new();
    let engine = Arc::new(FakeEngine::new(32.0, 0));
    let uploader = Arc::new(FakeUploader {
        reject_key: true,
        ..FakeUploader::default()
    });
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        engine.clone(),
        Some(uploader.clone() as Arc<dyn PackUploader>),
    );

    let result = orchestrator.submit(harness.request("song.ogg")).await;

    assert_eq!(result.phase, JobPhase::Failed);
    assert!(result.error.unwrap().starts_with("Authorization failed"));
    assert!(engine.calls().is_empty());
    assert_eq!(orchestrator.gate().state(), GateState::Uninitialized);
    assert_eq!(*uploader.events.lock(), vec!["verify".to_string()]);
}

#[tokio::test]
async fn missing_key_is_rejected_when_uploading() {
    let harness = Harness::new();
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(32.0, 0)),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    );

    let request = JobRequest::new(harness.audio("song.ogg"), "Test", "Case");
    let result = orchestrator.submit(request).await;
    assert_eq!(result.phase, JobPhase::Failed);
    assert!(result.error.unwrap().contains("access key"));
}

#[tokio::test]
async fn dry_run_archives_without_uploading() {
    let mut harness = Harness::new();
    harness.settings.backend.upload = false;
    let export = harness.dir.path().join("packs");
    let uploader = Arc::new(FakeUploader::default());
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(40.0, 2)),
        Some(uploader.clone() as Arc<dyn PackUploader>),
    );

    let request = JobRequest::new(harness.audio("song.ogg"), "Test", "Case").with_export_dir(&export);
    let result = orchestrator.submit(request).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.is_dry_run());
    assert_eq!(result.phase, JobPhase::Done);
    assert!(uploader.events.lock().is_empty());
    assert_eq!(result.saved_archives.len(), 3);
    assert!(export.join("Test.zip").is_file());
    assert!(export.join("part-2.zip").is_file());
}

#[tokio::test]
async fn cover_art_fills_in_for_missing_thumbnail() {
    let harness = Harness::new();
    let mut engine = FakeEngine::new(20.0, 1);
    engine.cover = Some(Bytes::from_static(b"cover png"));
    let archiver = Arc::new(RecordingArchiver::default());
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(engine),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    )
    .with_archiver(archiver.clone());

    let result = orchestrator.submit(harness.request("song.ogg")).await;
    assert!(result.success, "{:?}", result.error);
    assert!(archiver
        .thumbnails
        .lock()
        .iter()
        .all(|(_, ptr)| ptr.is_some()));
}

#[tokio::test]
async fn second_submission_while_running_is_busy() {
    let harness = Harness::new();
    let mut engine = FakeEngine::new(32.0, 0);
    engine.load_delay = Duration::from_millis(50);
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(engine),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    );

    let (first, second) = tokio::join!(
        orchestrator.submit(harness.request("a.ogg")),
        orchestrator.submit(harness.request("b.ogg"))
    );

    assert!(first.success, "{:?}", first.error);
    assert!(!second.success);
    assert_eq!(second.phase, JobPhase::Idle);
    assert!(second.error.unwrap().contains("already in progress"));
    assert!(!orchestrator.is_busy());
}

#[tokio::test]
async fn work_dir_is_removed_and_log_is_kept() {
    let harness = Harness::new();
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(32.0, 0)),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    );

    let result = orchestrator.submit(harness.request("song.ogg")).await;
    assert!(result.success, "{:?}", result.error);

    let work_dir = Path::new(&harness.settings.paths.temp_root).join(&result.job_id);
    assert!(!work_dir.exists());
    let log = std::fs::read_to_string(result.log_path.unwrap()).unwrap();
    assert!(log.contains("abc123:640:VGVzdA=="));
}

#[tokio::test]
async fn engine_load_failure_is_reported() {
    struct BrokenEngine;

    #[async_trait]
    impl AudioEngine for BrokenEngine {
        async fn load(&self) -> EngineResult<()> {
            Err(EngineError::ToolNotFound {
                tool: "ffmpeg".into(),
                detail: "not found in PATH".into(),
            })
        }
        async fn convert(&self, _: &Path, _: &Path, _: &dyn EngineObserver) -> EngineResult<PathBuf> {
            unreachable!()
        }
        async fn render_primary(&self, _: &Path, _: &Path, _: &dyn EngineObserver) -> EngineResult<PrimaryAudio> {
            unreachable!()
        }
        async fn segment(
            &self,
            _: &Path,
            _: &Path,
            _: u32,
            _: &dyn EngineObserver,
        ) -> EngineResult<Box<dyn SegmentSource>> {
            unreachable!()
        }
        async fn probe_duration(&self, _: &Path) -> EngineResult<f64> {
            unreachable!()
        }
        async fn extract_cover(&self, _: &Path, _: &Path) -> EngineResult<Option<Bytes>> {
            unreachable!()
        }
    }

    let harness = Harness::new();
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(BrokenEngine),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    );

    let result = orchestrator.submit(harness.request("song.ogg")).await;
    assert_eq!(result.phase, JobPhase::Failed);
    let error = result.error.unwrap();
    assert!(error.starts_with("Engine failed:"), "{error}");
    assert!(matches!(orchestrator.gate().state(), GateState::Failed(_)));
}

// ---------------------------------------------------------------------------
// Names, batches and skipped stages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn names_are_used_exactly_as_submitted() {
    let harness = Harness::new();
    let uploader = Arc::new(FakeUploader::default());
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(32.0, 0)),
        Some(uploader.clone() as Arc<dyn PackUploader>),
    );

    let request = JobRequest::new(harness.audio("song.ogg"), " Test ", "Case").with_access_key("key");
    let result = orchestrator.submit(request).await;
    assert!(result.success, "{:?}", result.error);

    let id = result.identifier.unwrap();
    let decoded = identifier::decode(IdentifierSchema::Song, &id).unwrap();
    assert_eq!(decoded.song_name, " Test ");
    assert_eq!(result.archive_digests[0].0, " Test .zip");
    assert_eq!(uploader.events.lock()[1], "full: Test .zip:0");
}

#[tokio::test]
async fn exported_archives_stay_inside_the_export_folder() {
    let mut harness = Harness::new();
    harness.settings.backend.upload = false;
    let export = harness.dir.path().join("packs");
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(20.0, 1)),
        None,
    );

    for (song, saved_as) in [("AC/DC", "AC_DC.zip"), ("../escaped", ".._escaped.zip")] {
        let request = JobRequest::new(harness.audio("song.ogg"), song, "Case").with_export_dir(&export);
        let result = orchestrator.submit(request).await;

        assert!(result.success, "{song}: {:?}", result.error);
        assert_eq!(result.archive_digests[0].0, format!("{song}.zip"));
        assert!(export.join(saved_as).is_file(), "{saved_as}");
        assert!(result
            .saved_archives
            .iter()
            .all(|p| p.parent() == Some(export.as_path())));
    }
    assert!(!harness.dir.path().join("escaped.zip").exists());
}

#[tokio::test]
async fn one_failed_charter_upload_fails_the_batch() {
    let harness = Harness::new();
    let uploader = Arc::new(FakeUploader {
        fail_part: Some(2),
        ..FakeUploader::default()
    });
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(50.0, 3)),
        Some(uploader.clone() as Arc<dyn PackUploader>),
    );

    let result = orchestrator.submit(harness.request("song.ogg")).await;

    assert!(!result.success);
    assert_eq!(result.phase, JobPhase::Failed);
    assert!(result.identifier.is_none());
    let error = result.error.unwrap();
    assert!(error.starts_with("Upload failed:"), "{error}");
    assert!(error.contains("413"), "{error}");

    let mut charters: Vec<String> = uploader
        .events
        .lock()
        .iter()
        .filter(|e| e.starts_with("charter:"))
        .cloned()
        .collect();
    charters.sort();
    assert_eq!(
        charters,
        vec![
            "charter:1:part-1.zip:abc123",
            "charter:2:part-2.zip:abc123",
            "charter:3:part-3.zip:abc123"
        ]
    );
}

#[tokio::test]
async fn one_failed_charter_archive_fails_the_batch() {
    let harness = Harness::new();
    let uploader = Arc::new(FakeUploader::default());
    let archiver = Arc::new(RecordingArchiver {
        fail_part: Some(1),
        ..RecordingArchiver::default()
    });
    let orchestrator = Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(50.0, 3)),
        Some(uploader.clone() as Arc<dyn PackUploader>),
    )
    .with_archiver(archiver.clone());

    let result = orchestrator.submit(harness.request("song.ogg")).await;

    assert_eq!(result.phase, JobPhase::Failed);
    assert!(result.identifier.is_none());
    let error = result.error.unwrap();
    assert!(error.starts_with("Archiving failed:"), "{error}");
    assert!(error.contains("disk full"), "{error}");
    // Every charter was still attempted.
    assert_eq!(archiver.thumbnails.lock().len(), 4);
    assert_eq!(*uploader.events.lock(), vec!["verify".to_string()]);
}

#[tokio::test]
async fn loaded_engine_stage_still_completes() {
    let harness = Harness::new();
    let (orchestrator, progress) = record_progress(Orchestrator::new(
        harness.settings.clone(),
        Arc::new(FakeEngine::new(32.0, 0)),
        Some(Arc::new(FakeUploader::default()) as Arc<dyn PackUploader>),
    ));

    let first = orchestrator.submit(harness.request("a.ogg")).await;
    assert!(first.success, "{:?}", first.error);
    progress.lock().clear();

    let second = orchestrator.submit(harness.request("b.ogg")).await;
    assert!(second.success, "{:?}", second.error);

    let engine_stage: Vec<u32> = progress
        .lock()
        .iter()
        .filter(|(stage, _, _)| stage == "Loading audio engine")
        .map(|(_, pct, _)| *pct)
        .collect();
    assert_eq!(engine_stage.first(), Some(&0));
    assert_eq!(engine_stage.last(), Some(&100));
}
