//! ffmpeg progress parsing.
//!
//! ffmpeg reports the input length once on stderr (`Duration: 00:00:40.05,`)
//! and then repeatedly rewrites a status line containing `time=00:00:12.34`.
//! Dividing the two gives the fraction done.

/// Parse an `HH:MM:SS.ff` timestamp into seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.starts_with('-') {
        return Some(0.0);
    }
    let mut parts = value.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    total.is_finite().then_some(total)
}

/// Input duration from a `Duration:` line, if present and known.
pub fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = &line[line.find("Duration:")? + "Duration:".len()..];
    let value = rest.split(',').next()?;
    parse_timestamp(value)
}

/// Output position from a `time=` status line.
pub fn parse_time_line(line: &str) -> Option<f64> {
    let rest = &line[line.find("time=")? + "time=".len()..];
    let value = rest.split_whitespace().next()?;
    parse_timestamp(value)
}

/// Tracks one ffmpeg run and converts its output lines into fractions.
#[derive(Debug, Default, Clone)]
pub struct FfmpegProgress {
    duration: Option<f64>,
    last: f64,
}

impl FfmpegProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Feed one line; returns the new fraction when the line advanced it.
    ///
    /// The first `Duration:` wins; later ones belong to outputs. Fractions
    /// never go backwards.
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        if self.duration.is_none() {
            if let Some(duration) = parse_duration_line(line) {
                if duration > 0.0 {
                    self.duration = Some(duration);
                }
                return None;
            }
        }

        let duration = self.duration?;
        let position = parse_time_line(line)?;
        let fraction = (position / duration).clamp(0.0, 1.0);
        if fraction > self.last {
            self.last = fraction;
            Some(fraction)
        } else {
            None
        }
    }
}
