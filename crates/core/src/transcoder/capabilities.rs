//! Encoder availability detection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::job::OutputSpec;

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::plan::ExecutionPlan;

/// Encoders the local ffmpeg build provides.
///
/// An undetected set (ffmpeg missing or unparseable output) allows everything
/// and lets the run itself fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    detected: bool,
    encoders: BTreeSet<String>,
}

impl EncoderCapabilities {
    /// Detect available encoders by probing ffmpeg.
    pub async fn detect(config: &TranscoderConfig) -> Self {
        let output = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => {
                let caps = Self::parse(&String::from_utf8_lossy(&o.stdout));
                debug!(encoders = caps.encoders.len(), "Detected ffmpeg encoders");
                caps
            }
            Ok(o) => {
                warn!(status = ?o.status.code(), "ffmpeg -encoders failed, skipping encoder checks");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "Could not run ffmpeg -encoders, skipping encoder checks");
                Self::default()
            }
        }
    }

    /// Parses the table printed by `ffmpeg -encoders`.
    pub fn parse(output: &str) -> Self {
        let mut encoders = BTreeSet::new();
        let mut in_table = false;
        for line in output.lines() {
            let line = line.trim();
            if line.starts_with("---") {
                in_table = true;
                continue;
            }
            if !in_table {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(flags), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };
            if flags.len() == 6 && matches!(flags.chars().next(), Some('V' | 'A' | 'S')) {
                encoders.insert(name.to_string());
            }
        }

        Self {
            detected: !encoders.is_empty(),
            encoders,
        }
    }

    /// Builds a set from explicit encoder names.
    pub fn from_encoders<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            detected: true,
            encoders: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether detection succeeded.
    pub fn is_detected(&self) -> bool {
        self.detected
    }

    /// Whether the named encoder is available.
    pub fn supports(&self, encoder: &str) -> bool {
        !self.detected || self.encoders.contains(encoder)
    }

    /// Checks explicitly requested codecs before a job is admitted.
    pub fn check_spec(&self, spec: &OutputSpec) -> Result<(), TranscodeError> {
        let mut wanted = Vec::new();
        if spec.thumbnail_only {
            wanted.push("mjpeg");
        }
        if let Some(codec) = spec.video_codec {
            wanted.push(codec.ffmpeg_encoder());
        }
        if let Some(codec) = spec.audio_codec {
            wanted.push(codec.ffmpeg_encoder());
        }
        self.check(wanted)
    }

    /// Checks every encoder a plan needs.
    pub fn check_plan(&self, plan: &ExecutionPlan) -> Result<(), TranscodeError> {
        self.check(plan.required_encoders())
    }

    fn check(&self, wanted: Vec<&'static str>) -> Result<(), TranscodeError> {
        match wanted.into_iter().find(|e| !self.supports(e)) {
            Some(missing) => Err(TranscodeError::unsupported(format!(
                "encoder {} is not available in this ffmpeg build",
                missing
            ))),
            None => Ok(()),
        }
    }
}
