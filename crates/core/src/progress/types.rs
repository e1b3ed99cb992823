//! Types for the progress module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Downloading,
    Probing,
    Transcoding,
    Uploading,
}

impl Stage {
    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Probing => "probing",
            Self::Transcoding => "transcoding",
            Self::Uploading => "uploading",
        }
    }

    /// Human-readable label used in status texts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Downloading => "Downloading",
            Self::Probing => "Analysing",
            Self::Transcoding => "Processing",
            Self::Uploading => "Uploading",
        }
    }
}

/// A single progress observation for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Job this event belongs to.
    pub job_id: String,
    /// Stage being reported.
    pub stage: Stage,
    /// Position within a multi-output job (1-based index, total).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<(usize, usize)>,
    /// Completed fraction in [0, 1].
    pub fraction: f32,
    /// Estimated seconds remaining.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
}

/// Estimates the remaining seconds from the completed fraction and elapsed time.
pub fn estimate_eta(fraction: f32, elapsed: Duration) -> Option<u64> {
    if !(fraction > 0.0 && fraction < 1.0) || elapsed.is_zero() {
        return None;
    }
    let total = elapsed.as_secs_f64() / fraction as f64;
    Some((total - elapsed.as_secs_f64()).max(0.0).round() as u64)
}

impl ProgressEvent {
    /// Whether this event belongs to a different step than `other`.
    pub fn is_new_step(&self, other: &ProgressEvent) -> bool {
        self.stage != other.stage || self.output != other.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_eta() {
        assert_eq!(estimate_eta(0.25, Duration::from_secs(10)), Some(30));
        assert_eq!(estimate_eta(0.0, Duration::from_secs(10)), None);
        assert_eq!(estimate_eta(1.0, Duration::from_secs(10)), None);
        assert_eq!(estimate_eta(0.5, Duration::ZERO), None);
    }

    #[test]
    fn test_is_new_step() {
        let a = ProgressEvent {
            job_id: "j".to_string(),
            stage: Stage::Transcoding,
            output: Some((1, 2)),
            fraction: 0.5,
            eta_secs: None,
        };
        let mut b = a.clone();
        assert!(!a.is_new_step(&b));
        b.output = Some((2, 2));
        assert!(a.is_new_step(&b));
    }
}
