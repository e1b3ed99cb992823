//! Types for the probe module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
}

/// A single track inside a media container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track kind.
    pub kind: TrackKind,
    /// Codec name in ffmpeg vocabulary (e.g., "h264", "aac").
    pub codec: String,
    /// Frame width (video).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Frame height (video).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Frame rate (video).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    /// Bitrate in kbps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    /// Sample rate in Hz (audio).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    /// Channel count (audio).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Language tag, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Track {
    /// Creates a track with only kind and codec set.
    pub fn new(kind: TrackKind, codec: impl Into<String>) -> Self {
        Self {
            kind,
            codec: codec.into(),
            width: None,
            height: None,
            fps: None,
            bitrate_kbps: None,
            sample_rate: None,
            channels: None,
            language: None,
        }
    }
}

/// Information about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds (0.0 when unknown).
    pub duration_secs: f64,
    /// Primary container name (e.g., "matroska", "mp4").
    pub format: String,
    /// Every name the container answers to (e.g., "mov", "mp4", "m4a").
    #[serde(default)]
    pub format_aliases: Vec<String>,
    /// Tracks in container order.
    pub tracks: Vec<Track>,
}

impl MediaInfo {
    /// First video track, if any.
    pub fn video(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Video)
    }

    /// First audio track, if any.
    pub fn audio(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Audio)
    }

    /// Whether the container answers to the given name.
    pub fn is_container(&self, name: &str) -> bool {
        self.format.eq_ignore_ascii_case(name)
            || self
                .format_aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    }

    /// Whether the file carries a video stream.
    pub fn has_video(&self) -> bool {
        self.video().is_some()
    }

    /// Whether the file carries an audio stream.
    pub fn has_audio(&self) -> bool {
        self.audio().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaInfo {
        let mut video = Track::new(TrackKind::Video, "h264");
        video.width = Some(1280);
        video.height = Some(720);
        MediaInfo {
            path: PathBuf::from("/scratch/in.mp4"),
            size_bytes: 1024,
            duration_secs: 12.5,
            format: "mov".to_string(),
            format_aliases: vec!["mov".into(), "mp4".into(), "m4a".into()],
            tracks: vec![video, Track::new(TrackKind::Audio, "aac")],
        }
    }

    #[test]
    fn test_track_accessors() {
        let info = sample();
        assert_eq!(info.video().unwrap().height, Some(720));
        assert_eq!(info.audio().unwrap().codec, "aac");
        assert!(info.has_video());
    }

    #[test]
    fn test_container_aliases() {
        let info = sample();
        assert!(info.is_container("MP4"));
        assert!(info.is_container("mov"));
        assert!(!info.is_container("matroska"));
    }
}
