//! [`AudioEngine`] backed by the `ffmpeg` and `ffprobe` binaries.

use std::collections::VecDeque;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::config::EngineSettings;

use super::probe::{parse_probe_output, probe_args};
use super::progress::FfmpegProgress;
use super::segments::{DirSegmentSource, SegmentSource};
use super::types::{
    EngineError, EngineObserver, EngineResult, NullObserver, PrimaryAudio, CONVERTED_FILE,
    COVER_FILE, PRIMARY_FILE, SEGMENT_DIR, SEGMENT_PATTERN,
};
use super::AudioEngine;

/// Lines of stderr kept for error messages.
const ERROR_TAIL_LINES: usize = 8;

/// Resolved tool locations.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Drives ffmpeg/ffprobe as subprocesses.
#[derive(Debug)]
pub struct FfmpegEngine {
    settings: EngineSettings,
    tools: OnceLock<ToolPaths>,
}

impl FfmpegEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            tools: OnceLock::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Tool paths, available after a successful [`AudioEngine::load`].
    pub fn tools(&self) -> EngineResult<&ToolPaths> {
        self.tools.get().ok_or(EngineError::NotLoaded)
    }

    /// Run ffmpeg with `args`, streaming stderr to `observer`.
    async fn run_ffmpeg(&self, args: &[OsString], observer: &dyn EngineObserver) -> EngineResult<()> {
        let tools = self.tools()?;
        run_tool("ffmpeg", &tools.ffmpeg, args, observer).await
    }
}

#[async_trait]
impl AudioEngine for FfmpegEngine {
    async fn load(&self) -> EngineResult<()> {
        if self.tools.get().is_some() {
            return Ok(());
        }

        let ffmpeg = resolve_tool("ffmpeg", &self.settings.ffmpeg_path)?;
        let ffprobe = resolve_tool("ffprobe", &self.settings.ffprobe_path)?;

        let version = ["-version"].map(OsString::from);
        run_tool("ffmpeg", &ffmpeg, &version, &NullObserver).await?;
        run_tool("ffprobe", &ffprobe, &version, &NullObserver).await?;

        tracing::info!(
            "Audio engine ready (ffmpeg: {}, ffprobe: {})",
            ffmpeg.display(),
            ffprobe.display()
        );
        let _ = self.tools.set(ToolPaths { ffmpeg, ffprobe });
        Ok(())
    }

    async fn convert(
        &self,
        input: &Path,
        work_dir: &Path,
        observer: &dyn EngineObserver,
    ) -> EngineResult<PathBuf> {
        let output = work_dir.join(CONVERTED_FILE);
        let args = args_with_io(
            input,
            &["-ac", "1", "-y", "-map", "0:a", "-map_metadata", "-1", "-acodec", "libvorbis"],
            &output,
        );
        self.run_ffmpeg(&args, observer).await?;

        if !output.exists() {
            return Err(EngineError::MissingOutput(output));
        }
        Ok(output)
    }

    async fn render_primary(
        &self,
        input: &Path,
        work_dir: &Path,
        observer: &dyn EngineObserver,
    ) -> EngineResult<PrimaryAudio> {
        let output = work_dir.join(PRIMARY_FILE);
        let args = args_with_io(
            input,
            &["-ac", "1", "-y", "-map", "0:a", "-map_metadata", "-1"],
            &output,
        );
        self.run_ffmpeg(&args, observer).await?;

        let bytes = read_output(&output).await?;
        Ok(PrimaryAudio {
            path: output,
            bytes,
        })
    }

    async fn segment(
        &self,
        input: &Path,
        work_dir: &Path,
        segment_seconds: u32,
        observer: &dyn EngineObserver,
    ) -> EngineResult<Box<dyn SegmentSource>> {
        let dir = work_dir.join(SEGMENT_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let segment_time = segment_seconds.max(1).to_string();
        let args = args_with_io(
            input,
            &[
                "-y",
                "-map",
                "0:a",
                "-f",
                "segment",
                "-segment_time",
                segment_time.as_str(),
                "-c",
                "copy",
            ],
            &dir.join(SEGMENT_PATTERN),
        );
        self.run_ffmpeg(&args, observer).await?;

        Ok(Box::new(DirSegmentSource::new(dir)))
    }

    async fn probe_duration(&self, audio: &Path) -> EngineResult<f64> {
        let tools = self.tools()?;
        let mut cmd = Command::new(&tools.ffprobe);
        cmd.args(probe_args())
            .arg(audio)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!("Running ffprobe: {:?}", cmd);

        let output = cmd.output().await.map_err(|source| EngineError::SpawnFailed {
            tool: "ffprobe".to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::command_failed(
                "ffprobe",
                output.status.code().unwrap_or(-1),
                stderr.trim(),
            ));
        }

        let seconds = parse_probe_output(&output.stdout)?;
        tracing::debug!("Probed {}: {:.3}s", audio.display(), seconds);
        Ok(seconds)
    }

    async fn extract_cover(&self, input: &Path, work_dir: &Path) -> EngineResult<Option<Bytes>> {
        let output = work_dir.join(COVER_FILE);
        let args = args_with_io(input, &["-map", "0:v", "-vframes", "1", "-y"], &output);

        match self.run_ffmpeg(&args, &NullObserver).await {
            Ok(()) => {}
            // No video stream is the common case, not an error.
            Err(EngineError::CommandFailed { exit_code, .. }) => {
                tracing::debug!("No cover art in {} (exit {})", input.display(), exit_code);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        match tokio::fs::read(&output).await {
            Ok(data) if !data.is_empty() => Ok(Some(Bytes::from(data))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// `-hide_banner -nostdin -i <input> <middle...> <output>`
fn args_with_io(input: &Path, middle: &[&str], output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-i".into()];
    args.push(input.as_os_str().to_owned());
    args.extend(middle.iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

async fn read_output(path: &Path) -> EngineResult<Bytes> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Bytes::from(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(EngineError::MissingOutput(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Run a tool to completion, forwarding stderr lines and progress.
///
/// ffmpeg rewrites its status line with `\r`, so both `\r` and `\n`
/// terminate a line.
async fn run_tool(
    tool: &str,
    program: &Path,
    args: &[OsString],
    observer: &dyn EngineObserver,
) -> EngineResult<()> {
    observer.on_command(&format_command(program, args));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!("Running {}: {:?}", tool, cmd);

    let mut child = cmd.spawn().map_err(|source| EngineError::SpawnFailed {
        tool: tool.to_string(),
        source,
    })?;

    let mut stderr = child.stderr.take().ok_or_else(|| EngineError::SpawnFailed {
        tool: tool.to_string(),
        source: std::io::Error::other("stderr was not captured"),
    })?;

    let mut progress = FfmpegProgress::new();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(ERROR_TAIL_LINES);
    let mut handle_line = |raw: &[u8]| {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        observer.on_output(line);
        if let Some(fraction) = progress.feed(line) {
            observer.on_progress(fraction);
        }
        if tail.len() == ERROR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    };

    let mut chunk = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let n = stderr.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        for &byte in &chunk[..n] {
            if byte == b'\n' || byte == b'\r' {
                handle_line(&pending[..]);
                pending.clear();
            } else {
                pending.push(byte);
            }
        }
    }
    handle_line(&pending[..]);

    let status = child.wait().await?;
    if !status.success() {
        let message = tail.iter().cloned().collect::<Vec<_>>().join("\n");
        return Err(EngineError::command_failed(
            tool,
            status.code().unwrap_or(-1),
            message,
        ));
    }
    Ok(())
}

fn format_command(program: &Path, args: &[OsString]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Use the configured path when set, otherwise search `PATH`.
fn resolve_tool(tool: &str, configured: &str) -> EngineResult<PathBuf> {
    let configured = configured.trim();
    if !configured.is_empty() {
        let path = PathBuf::from(configured);
        if path.is_file() {
            return Ok(path);
        }
        return Err(EngineError::ToolNotFound {
            tool: tool.to_string(),
            detail: format!("configured path '{}' does not exist", configured),
        });
    }

    find_in_path(tool).ok_or_else(|| EngineError::ToolNotFound {
        tool: tool.to_string(),
        detail: "not found in PATH".to_string(),
    })
}

fn find_in_path(tool: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let full = dir.join(tool);
        if full.is_file() {
            return Some(full);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{tool}.exe"));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}
