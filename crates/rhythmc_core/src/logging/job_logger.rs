//! Per-job logger with file and callback output.
//!
//! Each job gets its own logger that:
//! - Writes to `<logs_folder>/<job_id>.log`
//! - Forwards every line to an optional callback
//! - Throttles status/progress lines in compact mode
//! - Keeps a tail of external tool output for failure reports

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LineCallback, LogConfig, LogLevel, MessagePrefix};

/// Last status line written, used to collapse repeated progress updates.
#[derive(Debug, Default)]
struct StatusMark {
    status: String,
    percent: u32,
}

/// Per-job logger with dual output (file + callback).
pub struct JobLogger {
    job_id: String,
    log_path: PathBuf,
    file_writer: Mutex<Option<BufWriter<File>>>,
    callback: Option<LineCallback>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_status: Mutex<Option<StatusMark>>,
}

impl JobLogger {
    /// Create a new job logger, creating `log_dir` if needed.
    pub fn new(
        job_id: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LineCallback>,
    ) -> std::io::Result<Self> {
        let job_id = job_id.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_id)));
        let file = File::create(&log_path)?;

        Ok(Self {
            job_id,
            log_path,
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            callback,
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
            last_status: Mutex::new(None),
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    /// Log an external command line.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    pub fn validation(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Validation.format(message));
    }

    /// Log a status line with its stage percentage.
    ///
    /// In compact mode a line whose status text is unchanged is only written
    /// when the percentage crosses a `progress_step` boundary or hits 100.
    /// Returns true if the line was written.
    pub fn status(&self, status: &str, percent: u32) -> bool {
        {
            let mut last = self.last_status.lock();
            if self.config.compact {
                if let Some(mark) = last.as_ref() {
                    let step = self.config.progress_step.max(1);
                    let same_status = mark.status == status;
                    let same_bucket = percent / step <= mark.percent / step;
                    if same_status && same_bucket && percent < 100 {
                        return false;
                    }
                    if same_status && percent == mark.percent {
                        return false;
                    }
                }
            }
            *last = Some(StatusMark {
                status: status.to_string(),
                percent,
            });
        }

        self.log(LogLevel::Info, &format!("{} ({}%)", status, percent));
        true
    }

    /// Record one line of external tool output.
    ///
    /// Always kept in the tail buffer; only written through in verbose mode.
    pub fn output_line(&self, line: &str) {
        {
            let mut buffer = self.tail_buffer.lock();
            if buffer.len() >= self.config.error_tail.max(1) {
                buffer.pop_front();
            }
            buffer.push_back(line.to_string());
        }

        if !self.config.compact {
            self.log(LogLevel::Debug, line);
        }
    }

    /// Write the tail buffer (typically after an error).
    pub fn show_tail(&self, header: &str) {
        let lines: Vec<String> = self.tail_buffer.lock().iter().cloned().collect();
        if lines.is_empty() {
            return;
        }
        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in lines {
            self.output(&self.format_message(&line));
        }
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Flush and close the log file. Later messages only reach the callback.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }
        if let Some(ref callback) = self.callback {
            callback(formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
