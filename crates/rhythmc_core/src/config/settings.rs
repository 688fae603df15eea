//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::identifier::IdentifierSchema;
use crate::logging::{LogConfig, LogLevel};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub identifier: IdentifierSettings,
}

/// Working, log and export directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root for per-job work directories.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Where archives are exported when export is requested.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Keep `<temp_root>/<job_id>` after the job finishes.
    #[serde(default)]
    pub keep_work_dir: bool,
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_output_folder() -> String {
    "packs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
            output_folder: default_output_folder(),
            keep_work_dir: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default = "default_true")]
    pub compact: bool,

    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
            show_timestamps: true,
        }
    }
}

impl LoggingSettings {
    /// Per-job logger configuration derived from these settings.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            progress_step: self.progress_step.max(1),
            error_tail: self.error_tail as usize,
            show_timestamps: self.show_timestamps,
        }
    }
}

/// ffmpeg/ffprobe location and segmentation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Explicit ffmpeg binary; empty means look it up on `PATH`.
    #[serde(default)]
    pub ffmpeg_path: String,

    /// Explicit ffprobe binary; empty means look it up on `PATH`.
    #[serde(default)]
    pub ffprobe_path: String,

    /// Length of each charter segment in seconds.
    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: u32,

    /// Use embedded cover art as the thumbnail when none is supplied.
    #[serde(default = "default_true")]
    pub extract_cover_art: bool,
}

fn default_segment_seconds() -> u32 {
    15
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: String::new(),
            ffprobe_path: String::new(),
            segment_seconds: default_segment_seconds(),
            extract_cover_art: true,
        }
    }
}

/// Upload backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds; 0 disables the timeout.
    #[serde(default)]
    pub request_timeout_secs: u64,

    /// Upload packs and produce an identifier. When false the job stops
    /// after archiving.
    #[serde(default = "default_true")]
    pub upload: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: 0,
            upload: true,
        }
    }
}

/// Result identifier format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifierSettings {
    #[serde(default)]
    pub schema: IdentifierSchema,
}

/// Config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Engine,
    Backend,
    Identifier,
}

impl ConfigSection {
    /// TOML table name of this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Engine => "engine",
            ConfigSection::Backend => "backend",
            ConfigSection::Identifier => "identifier",
        }
    }

    pub fn all() -> [ConfigSection; 5] {
        [
            ConfigSection::Paths,
            ConfigSection::Logging,
            ConfigSection::Engine,
            ConfigSection::Backend,
            ConfigSection::Identifier,
        ]
    }
}
