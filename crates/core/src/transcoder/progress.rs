//! Parser for ffmpeg's `-progress` key/value stream.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static TIMESTAMP: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(-)?(\d+):(\d{2}):(\d{2}(?:\.\d+)?)$").ok());

static SPEED: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)x$").ok());

/// One completed block of the progress stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ProgressUpdate {
    /// Fraction of the effective duration written so far.
    pub fraction: f32,
    /// Estimated seconds remaining, from the reported speed.
    pub eta_secs: Option<u64>,
    /// ffmpeg reported `progress=end`.
    pub finished: bool,
}

/// Accumulates keys until a `progress=` line closes the block.
#[derive(Debug)]
pub(crate) struct ProgressParser {
    duration_secs: f64,
    out_secs: f64,
    speed: Option<f64>,
}

impl ProgressParser {
    /// `duration_secs` is the length of media the output covers; zero if unknown.
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            out_secs: 0.0,
            speed: None,
        }
    }

    /// Feeds one stdout line. Returns an update at the end of each block.
    pub fn feed(&mut self, line: &str) -> Option<ProgressUpdate> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" | "out_time_ms" => {
                // Both keys carry microseconds.
                if let Ok(us) = value.parse::<i64>() {
                    self.out_secs = (us.max(0) as f64) / 1_000_000.0;
                }
                None
            }
            "out_time" => {
                if let Some(secs) = parse_timestamp(value) {
                    self.out_secs = secs;
                }
                None
            }
            "speed" => {
                self.speed = parse_speed(value);
                None
            }
            "progress" => {
                let finished = value == "end";
                Some(ProgressUpdate {
                    fraction: if finished { 1.0 } else { self.fraction() },
                    eta_secs: if finished { Some(0) } else { self.eta() },
                    finished,
                })
            }
            _ => None,
        }
    }

    fn fraction(&self) -> f32 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_secs / self.duration_secs).clamp(0.0, 1.0) as f32
    }

    fn eta(&self) -> Option<u64> {
        let speed = self.speed.filter(|s| *s > 0.0)?;
        if self.duration_secs <= 0.0 {
            return None;
        }
        let remaining = (self.duration_secs - self.out_secs).max(0.0);
        Some((remaining / speed).round() as u64)
    }
}

/// Parses `HH:MM:SS.ffffff`. Negative stamps clamp to zero.
pub(crate) fn parse_timestamp(value: &str) -> Option<f64> {
    let caps = TIMESTAMP.as_ref()?.captures(value.trim())?;
    if caps.get(1).is_some() {
        return Some(0.0);
    }
    let hours: f64 = caps.get(2)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(3)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(4)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn parse_speed(value: &str) -> Option<f64> {
    let caps = SPEED.as_ref()?.captures(value)?;
    caps.get(1)?.as_str().parse().ok()
}
