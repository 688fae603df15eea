//! Job request and timing helpers.

use std::path::{Path, PathBuf};

use bytes::Bytes;

/// Extension of the canonical audio encoding (mono Ogg Vorbis).
pub const CANONICAL_EXTENSION: &str = "ogg";

/// Game ticks per second.
pub const TICKS_PER_SECOND: u64 = 20;

/// One pack-building request as submitted by the user.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    /// Source audio file. `None` when no file was selected.
    pub audio_path: Option<PathBuf>,
    pub song_name: String,
    pub composer_name: String,
    /// Thumbnail bytes stored as `pack.png` in every pack.
    pub thumbnail: Option<Bytes>,
    /// Access key sent as `X-Auth-Token`.
    pub access_key: Option<String>,
    /// Directory to save finished archives in.
    pub export_dir: Option<PathBuf>,
}

impl JobRequest {
    pub fn new(
        audio_path: impl Into<PathBuf>,
        song_name: impl Into<String>,
        composer_name: impl Into<String>,
    ) -> Self {
        Self {
            audio_path: Some(audio_path.into()),
            song_name: song_name.into(),
            composer_name: composer_name.into(),
            thumbnail: None,
            access_key: None,
            export_dir: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<Bytes>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = Some(key.into());
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    /// Whether the input must be converted before processing.
    ///
    /// Inputs with a `.ogg` extension (any case) are taken as canonical.
    pub fn needs_conversion(&self) -> bool {
        self.audio_path
            .as_deref()
            .map(|p| !is_canonical_audio(p))
            .unwrap_or(true)
    }
}

/// True when `path` already has the canonical extension.
pub fn is_canonical_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(CANONICAL_EXTENSION))
        .unwrap_or(false)
}

/// Convert a duration in seconds to game ticks, rounding down.
pub fn duration_to_ticks(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * TICKS_PER_SECOND as f64).floor() as u64
}
