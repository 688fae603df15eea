//! Duration probing with ffprobe.

use serde::Deserialize;

use super::types::{EngineError, EngineResult};

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Arguments for `ffprobe` that print the container duration as JSON.
pub fn probe_args() -> [&'static str; 6] {
    ["-v", "error", "-show_entries", "format=duration", "-of", "json"]
}

/// Parse `ffprobe -show_entries format=duration -of json` output.
pub fn parse_probe_output(stdout: &[u8]) -> EngineResult<f64> {
    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| EngineError::ProbeFailed(format!("invalid ffprobe JSON: {}", e)))?;

    let raw = output
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| EngineError::ProbeFailed("no duration reported".to_string()))?;

    let seconds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| EngineError::ProbeFailed(format!("unparseable duration '{}'", raw)))?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(EngineError::ProbeFailed(format!(
            "invalid duration {}",
            seconds
        )));
    }
    Ok(seconds)
}
