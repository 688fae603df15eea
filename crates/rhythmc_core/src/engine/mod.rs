//! Transcode and segment engine.
//!
//! [`AudioEngine`] is the seam between the pipeline and whatever turns user
//! audio into canonical mono Ogg Vorbis. [`FfmpegEngine`] is the production
//! implementation; tests drive the pipeline with in-memory engines.
//!
//! Every operation takes the job's work directory. Engines write their
//! intermediate files there and never outside it.

mod ffmpeg;
mod gate;
mod probe;
mod progress;
mod segments;
mod types;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

pub use ffmpeg::{FfmpegEngine, ToolPaths};
pub use gate::{EngineGate, GateState};
pub use probe::parse_probe_output;
pub use progress::{parse_duration_line, parse_time_line, parse_timestamp, FfmpegProgress};
pub use segments::{DirSegmentSource, MemorySegmentSource, Segment, SegmentSource, SegmentStream};
pub use types::{
    EngineError, EngineObserver, EngineResult, NullObserver, PrimaryAudio, CONVERTED_FILE,
    COVER_FILE, PRIMARY_FILE, SEGMENT_DIR,
};

#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Prepare the engine. Called through [`EngineGate`], at most once at a
    /// time.
    async fn load(&self) -> EngineResult<()>;

    /// Re-encode `input` to canonical mono Ogg Vorbis without metadata.
    async fn convert(
        &self,
        input: &Path,
        work_dir: &Path,
        observer: &dyn EngineObserver,
    ) -> EngineResult<PathBuf>;

    /// Render the mono primary track used by the full pack.
    async fn render_primary(
        &self,
        input: &Path,
        work_dir: &Path,
        observer: &dyn EngineObserver,
    ) -> EngineResult<PrimaryAudio>;

    /// Split `input` into `segment_seconds`-long pieces.
    async fn segment(
        &self,
        input: &Path,
        work_dir: &Path,
        segment_seconds: u32,
        observer: &dyn EngineObserver,
    ) -> EngineResult<Box<dyn SegmentSource>>;

    /// Playback duration of `audio` in seconds.
    async fn probe_duration(&self, audio: &Path) -> EngineResult<f64>;

    /// First embedded picture of `input`, if any.
    async fn extract_cover(&self, input: &Path, work_dir: &Path) -> EngineResult<Option<Bytes>>;
}
