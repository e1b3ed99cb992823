//! Execution plan selection.
//!
//! Decides per stream whether to copy, re-encode or drop it, and whether the
//! whole output can be produced by a remux.

use serde::Serialize;

use crate::job::OutputSpec;
use crate::probe::{MediaInfo, Track, TrackKind};

use super::error::TranscodeError;
use super::types::{AudioCodec, ContainerFormat, PlanKind, Quality, TimeRange, VideoCodec};

/// What happens to one elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPlan<C> {
    /// Not included in the output.
    Drop,
    /// Copied bit for bit.
    Copy,
    /// Re-encoded with the given codec.
    Encode(C),
}

impl<C> StreamPlan<C> {
    pub fn is_encode(&self) -> bool {
        matches!(self, Self::Encode(_))
    }

    pub fn is_included(&self) -> bool {
        !matches!(self, Self::Drop)
    }
}

/// How one output is going to be produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub kind: PlanKind,
    pub video: StreamPlan<VideoCodec>,
    pub audio: StreamPlan<AudioCodec>,
    /// Subtitle streams are carried over (Matroska only).
    pub copy_subtitles: bool,
    /// Downscale target height.
    pub scale_height: Option<u32>,
    /// Clip to cut.
    pub range: Option<TimeRange>,
    /// Seek position of the frame to grab (thumbnails).
    pub seek_secs: Option<f64>,
    /// Seconds of media covered by the output; zero when unknown.
    pub effective_duration: f64,
}

impl ExecutionPlan {
    /// Selects the plan for producing `spec` from the probed input.
    pub fn select(
        spec: &OutputSpec,
        info: &MediaInfo,
        thumbnail_offset_secs: f64,
    ) -> Result<Self, TranscodeError> {
        let range = spec.range;
        let effective_duration = effective_duration(info.duration_secs, range);

        if let Some(range) = range {
            if info.duration_secs > 0.0 && range.start_secs >= info.duration_secs {
                return Err(TranscodeError::unsupported(format!(
                    "range starts at {:.1}s but the input is {:.1}s long",
                    range.start_secs, info.duration_secs
                )));
            }
        }

        if spec.thumbnail_only {
            return Self::thumbnail(spec, info, thumbnail_offset_secs);
        }

        let container = spec.container;
        let video = plan_video(spec, info.video(), container)?;
        let audio = plan_audio(spec, info.audio(), container, video.is_included())?;

        if !video.is_included() && !audio.is_included() {
            return Err(TranscodeError::unsupported(format!(
                "{} output would contain no streams",
                container.extension()
            )));
        }

        let scale_height = match (video, spec.max_height, info.video().and_then(|t| t.height)) {
            (StreamPlan::Encode(_), Some(max), Some(height)) if height > max => Some(max),
            _ => None,
        };

        let kind = if video.is_encode() || audio.is_encode() {
            PlanKind::Encode
        } else {
            PlanKind::Remux
        };

        Ok(Self {
            kind,
            video,
            audio,
            copy_subtitles: container == ContainerFormat::Mkv
                && info.tracks.iter().any(|t| t.kind == TrackKind::Subtitle),
            scale_height,
            range,
            seek_secs: None,
            effective_duration,
        })
    }

    fn thumbnail(
        spec: &OutputSpec,
        info: &MediaInfo,
        offset_secs: f64,
    ) -> Result<Self, TranscodeError> {
        if !info.has_video() {
            return Err(TranscodeError::unsupported(
                "input has no video stream to take a thumbnail from",
            ));
        }

        let base = spec.range.map(|r| r.start_secs).unwrap_or(0.0);
        let available = effective_duration(info.duration_secs, spec.range);
        // Short clips would seek past the end; stay in the first half.
        let offset = if available > 0.0 {
            offset_secs.max(0.0).min(available / 2.0)
        } else {
            0.0
        };

        Ok(Self {
            kind: PlanKind::Thumbnail,
            video: StreamPlan::Drop,
            audio: StreamPlan::Drop,
            copy_subtitles: false,
            scale_height: spec.max_height,
            range: None,
            seek_secs: Some(base + offset),
            effective_duration: 0.0,
        })
    }

    /// ffmpeg encoders this plan needs.
    pub fn required_encoders(&self) -> Vec<&'static str> {
        let mut encoders = Vec::new();
        if self.kind == PlanKind::Thumbnail {
            encoders.push("mjpeg");
        }
        if let StreamPlan::Encode(codec) = self.video {
            encoders.push(codec.ffmpeg_encoder());
        }
        if let StreamPlan::Encode(codec) = self.audio {
            encoders.push(codec.ffmpeg_encoder());
        }
        encoders
    }
}

fn plan_video(
    spec: &OutputSpec,
    track: Option<&Track>,
    container: ContainerFormat,
) -> Result<StreamPlan<VideoCodec>, TranscodeError> {
    let Some(track) = track else {
        if spec.video_codec.is_some() {
            return Err(TranscodeError::unsupported(
                "video codec requested but the input has no video",
            ));
        }
        return Ok(StreamPlan::Drop);
    };

    let allowed = container.allowed_video_codecs();
    if allowed.is_empty() {
        return Ok(StreamPlan::Drop);
    }

    let target = spec
        .video_codec
        .or_else(|| allowed.iter().copied().find(|c| c.matches(&track.codec)))
        .unwrap_or(allowed[0]);

    let needs_scale = matches!(
        (spec.max_height, track.height),
        (Some(max), Some(height)) if height > max
    );

    let copy = target.matches(&track.codec)
        && !needs_scale
        && spec.range.is_none()
        && bitrate_satisfied(spec.quality, track.bitrate_kbps);

    Ok(if copy {
        StreamPlan::Copy
    } else {
        StreamPlan::Encode(target)
    })
}

fn plan_audio(
    spec: &OutputSpec,
    track: Option<&Track>,
    container: ContainerFormat,
    has_video: bool,
) -> Result<StreamPlan<AudioCodec>, TranscodeError> {
    let Some(track) = track else {
        if spec.audio_codec.is_some() {
            return Err(TranscodeError::unsupported(
                "audio codec requested but the input has no audio",
            ));
        }
        return Ok(StreamPlan::Drop);
    };

    let allowed = container.allowed_audio_codecs();
    if allowed.is_empty() {
        return Ok(StreamPlan::Drop);
    }

    let target = spec
        .audio_codec
        .or_else(|| allowed.iter().copied().find(|c| c.matches(&track.codec)))
        .unwrap_or(allowed[0]);

    // A bitrate target applies to audio only when there is no video.
    let quality = if has_video {
        Quality::Default
    } else {
        spec.quality
    };

    let copy = target.matches(&track.codec)
        && spec.range.is_none()
        && bitrate_satisfied(quality, track.bitrate_kbps);

    Ok(if copy {
        StreamPlan::Copy
    } else {
        StreamPlan::Encode(target)
    })
}

/// Whether the source already meets the quality target without re-encoding.
fn bitrate_satisfied(quality: Quality, source_kbps: Option<u32>) -> bool {
    match quality {
        Quality::Default | Quality::Crf(_) => true,
        Quality::BitrateKbps(target) => source_kbps.is_some_and(|source| source <= target),
    }
}

/// Seconds of media an output covers.
pub(crate) fn effective_duration(duration_secs: f64, range: Option<TimeRange>) -> f64 {
    let start = range.map(|r| r.start_secs).unwrap_or(0.0);
    let remaining = (duration_secs - start).max(0.0);
    match range.and_then(|r| r.duration_secs) {
        Some(clip) if duration_secs > 0.0 => clip.min(remaining),
        Some(clip) => clip,
        None => remaining,
    }
}
