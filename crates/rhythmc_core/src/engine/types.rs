//! Engine types and errors.

use std::path::PathBuf;

use bytes::Bytes;
use thiserror::Error;

/// File names used inside a job's work directory.
pub const CONVERTED_FILE: &str = "converted.ogg";
pub const PRIMARY_FILE: &str = "death.ogg";
pub const COVER_FILE: &str = "cover.png";
pub const SEGMENT_DIR: &str = "segments";
pub const SEGMENT_PATTERN: &str = "segment%03d.ogg";

/// Errors from the transcode/segment engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Required tool '{tool}' not found: {detail}")]
    ToolNotFound { tool: String, detail: String },

    #[error("Audio engine is not loaded")]
    NotLoaded,

    #[error("Audio engine failed to load: {0}")]
    LoadFailed(String),

    #[error("Failed to spawn {tool}: {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("Duration probe failed: {0}")]
    ProbeFailed(String),

    #[error("Expected output was not produced: {0}")]
    MissingOutput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn command_failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// The rendered primary audio: the file on disk and its bytes.
#[derive(Debug, Clone)]
pub struct PrimaryAudio {
    pub path: PathBuf,
    pub bytes: Bytes,
}

/// Receives what an engine operation emits while it runs.
///
/// All methods default to no-ops.
pub trait EngineObserver: Send + Sync {
    /// A tool invocation is about to start.
    fn on_command(&self, _command: &str) {}

    /// One line of tool output.
    fn on_output(&self, _line: &str) {}

    /// Fraction of the current operation completed, in `[0, 1]`.
    fn on_progress(&self, _fraction: f64) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl EngineObserver for NullObserver {}
