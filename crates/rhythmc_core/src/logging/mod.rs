//! Logging infrastructure.
//!
//! This module provides:
//! - Per-job loggers with file + callback dual output
//! - Compact mode that collapses repeated status lines
//! - Tail buffer of ffmpeg output for failure diagnosis
//! - Global `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use rhythmc_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("3f2a9c1e", "/tmp/rhythmc-logs", LogConfig::default(), None).unwrap();
//! logger.phase("Archiving");
//! logger.status("(4/4) Creating ZIP files", 50);
//! logger.success("Archives ready");
//! ```

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub use types::{LineCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`, falling back to `default_level`. Output goes to
/// stderr so that stdout stays reserved for the result identifier.
/// Calling it twice is harmless; the second call is ignored.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(filter)
        .try_init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
