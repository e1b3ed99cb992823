//! Core job data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::Stage;
use crate::transcoder::{
    AudioCodec, ContainerFormat, EmbeddedMetadata, PlanKind, Quality, TimeRange, VideoCodec,
};
use crate::transport::{MediaKind, MediaRef, RemoteRef, StatusTarget};

use super::error::JobError;

/// Dispatch priority. Higher classes are always dispatched first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }
}

/// One derived output of a job.
///
/// A `None` codec keeps the source stream: it is copied when the target
/// container accepts it and re-encoded with the container's first codec
/// otherwise. Containers that cannot hold video drop the video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Target container.
    pub container: ContainerFormat,
    /// Target video codec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<VideoCodec>,
    /// Target audio codec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<AudioCodec>,
    /// Quality target for re-encoded streams.
    #[serde(default)]
    pub quality: Quality,
    /// Downscale so the frame is at most this tall.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    /// Clip of the input to keep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<TimeRange>,
    /// Produce a single still frame instead of media.
    #[serde(default)]
    pub thumbnail_only: bool,
    /// Tags written into the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EmbeddedMetadata>,
    /// File name template, e.g. `"{title} S{season}E{episode} [{quality}]"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Presentation on the transport. Derived from the container when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_as: Option<MediaKind>,
    /// Caption sent with the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl OutputSpec {
    /// Output in `container` with every other field at its default.
    pub fn new(container: ContainerFormat) -> Self {
        Self {
            container,
            video_codec: None,
            audio_codec: None,
            quality: Quality::Default,
            max_height: None,
            range: None,
            thumbnail_only: false,
            metadata: None,
            file_name: None,
            send_as: None,
            caption: None,
        }
    }

    /// A JPEG still frame.
    pub fn thumbnail() -> Self {
        Self {
            thumbnail_only: true,
            ..Self::new(ContainerFormat::Jpeg)
        }
    }

    pub fn with_video(mut self, codec: VideoCodec) -> Self {
        self.video_codec = Some(codec);
        self
    }

    pub fn with_audio(mut self, codec: AudioCodec) -> Self {
        self.audio_codec = Some(codec);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_max_height(mut self, height: u32) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn with_range(mut self, start_secs: f64, duration_secs: Option<f64>) -> Self {
        self.range = Some(TimeRange {
            start_secs,
            duration_secs,
        });
        self
    }

    pub fn with_file_name(mut self, template: impl Into<String>) -> Self {
        self.file_name = Some(template.into());
        self
    }

    pub fn with_send_as(mut self, kind: MediaKind) -> Self {
        self.send_as = Some(kind);
        self
    }

    /// Presentation used when delivering this output.
    pub fn effective_send_as(&self) -> MediaKind {
        if let Some(kind) = self.send_as {
            return kind;
        }
        if self.thumbnail_only {
            MediaKind::Photo
        } else if self.container.allows_video() {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }
}

/// Submission payload. Validated into a [`Job`] on admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Opaque id of the user who asked for the job.
    pub requester: String,
    /// Chat the outputs are delivered to.
    pub chat_id: String,
    /// Media to fetch.
    pub input: MediaRef,
    /// Outputs to derive, in delivery order.
    pub outputs: Vec<OutputSpec>,
    #[serde(default)]
    pub priority: Priority,
    /// Message whose text tracks the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_target: Option<StatusTarget>,
    /// Message the outputs reply to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Downloading,
    Probing,
    Transcoding,
    Uploading,
    Done,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Whether a worker is processing the job.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::Downloading | Self::Probing | Self::Transcoding | Self::Uploading
        )
    }

    /// Whether the state machine allows moving to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match self {
            Queued => matches!(next, Downloading | Failed | Cancelled),
            Downloading => matches!(next, Probing | Failed | Cancelled),
            Probing => matches!(next, Transcoding | Failed | Cancelled),
            Transcoding => matches!(next, Uploading | Done | Failed | Cancelled),
            // Back to Transcoding for the next output of a multi-output job.
            Uploading => matches!(next, Transcoding | Done | Failed | Cancelled),
            Done | Failed | Cancelled => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Probing => "probing",
            Self::Transcoding => "transcoding",
            Self::Uploading => "uploading",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad cause of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport error that was not (or no longer) retryable.
    Transport,
    /// A stage exceeded its deadline.
    Timeout,
    /// The input is not media we can read.
    UnreadableMedia,
    /// The output cannot be produced with this toolchain.
    Unsupported,
    /// ffmpeg failed.
    Transcode,
    /// Scratch storage failed.
    Storage,
    /// Anything else.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::UnreadableMedia => "unreadable_media",
            Self::Unsupported => "unsupported",
            Self::Transcode => "transcode",
            Self::Storage => "storage",
            Self::Internal => "internal",
        }
    }
}

/// Structured failure cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Stage that failed.
    pub stage: Stage,
    pub kind: FailureKind,
    /// Sanitised message, safe to show to the requester.
    pub message: String,
}

impl JobFailure {
    pub fn new(stage: Stage, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of one output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    Delivered,
    Failed,
    /// Not attempted because the job stopped first.
    Skipped,
}

/// Result of processing one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputResult {
    /// Position in `Job::outputs`.
    pub index: usize,
    pub status: OutputStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
}

impl OutputResult {
    pub fn skipped(index: usize) -> Self {
        Self {
            index,
            status: OutputStatus::Skipped,
            file_name: None,
            plan: None,
            size_bytes: None,
            remote: None,
            error: None,
        }
    }

    pub fn failed(index: usize, failure: JobFailure) -> Self {
        Self {
            status: OutputStatus::Failed,
            error: Some(failure),
            ..Self::skipped(index)
        }
    }
}

/// A unit of work: one input, one or more outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique id (UUID v4).
    pub id: String,
    pub requester: String,
    pub chat_id: String,
    pub input: MediaRef,
    pub outputs: Vec<OutputSpec>,
    pub priority: Priority,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_progress_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_target: Option<StatusTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    /// Per-output results, filled in as outputs finish.
    #[serde(default)]
    pub results: Vec<OutputResult>,
}

impl Job {
    /// Builds a queued job from an already validated request.
    pub(crate) fn from_request(request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            requester: request.requester,
            chat_id: request.chat_id,
            input: request.input,
            outputs: request.outputs,
            priority: request.priority,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            last_progress_at: None,
            status_target: request.status_target,
            reply_to: request.reply_to,
            error: None,
            results: Vec::new(),
        }
    }

    /// Moves the job to `next`, enforcing the state machine.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Number of outputs delivered so far.
    pub fn delivered(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == OutputStatus::Delivered)
            .count()
    }
}
