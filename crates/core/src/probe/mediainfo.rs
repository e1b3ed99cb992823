//! mediainfo-based probe implementation.
//!
//! mediainfo reports formats in its own vocabulary ("AVC", "MPEG-4"); they are
//! mapped onto ffmpeg names so the transcoder can compare them with its codecs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::config::ProbeConfig;
use super::error::ProbeError;
use super::ffprobe::parse_frame_rate;
use super::runner::{check_tool, run_tool};
use super::traits::MediaProbe;
use super::types::{MediaInfo, Track, TrackKind};

/// Probe backed by `mediainfo --Output=JSON`.
pub struct MediainfoProbe {
    config: ProbeConfig,
}

#[derive(Deserialize)]
struct MediainfoOutput {
    media: Option<MediainfoMedia>,
}

#[derive(Deserialize)]
struct MediainfoMedia {
    #[serde(default)]
    track: Vec<Value>,
}

impl MediainfoProbe {
    /// Creates a new mediainfo probe with the given configuration.
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub(crate) fn parse_output(path: &Path, output: &str) -> Result<MediaInfo, ProbeError> {
        let parsed: MediainfoOutput = serde_json::from_str(output)
            .map_err(|e| ProbeError::unreadable(format!("invalid mediainfo output: {}", e)))?;
        let entries = parsed
            .media
            .map(|m| m.track)
            .ok_or_else(|| ProbeError::unreadable("no media section"))?;

        let mut general: Option<&Value> = None;
        let mut tracks = Vec::new();

        for entry in &entries {
            let kind = match field(entry, "@type").as_deref() {
                Some("General") => {
                    general = Some(entry);
                    continue;
                }
                Some("Video") => TrackKind::Video,
                Some("Audio") => TrackKind::Audio,
                Some("Text") => TrackKind::Subtitle,
                _ => continue,
            };

            let format = field(entry, "Format").unwrap_or_default();
            let profile = field(entry, "Format_Profile");
            let codec = normalize_codec(kind, &format, profile.as_deref());

            tracks.push(Track {
                kind,
                codec,
                width: number(entry, "Width"),
                height: number(entry, "Height"),
                fps: field(entry, "FrameRate").as_deref().and_then(parse_frame_rate),
                bitrate_kbps: number::<u64>(entry, "BitRate").map(|b| (b / 1000) as u32),
                sample_rate: number(entry, "SamplingRate"),
                channels: number(entry, "Channels"),
                language: field(entry, "Language"),
            });
        }

        let general = general.ok_or_else(|| ProbeError::unreadable("no general section"))?;

        if !tracks
            .iter()
            .any(|t| matches!(t.kind, TrackKind::Video | TrackKind::Audio))
        {
            return Err(ProbeError::unreadable("no audio or video streams found"));
        }

        let container = field(general, "Format").unwrap_or_else(|| "unknown".to_string());
        let format_aliases = normalize_container(&container);

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes: number(general, "FileSize").unwrap_or(0),
            duration_secs: field(general, "Duration")
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0),
            format: format_aliases
                .first()
                .cloned()
                .unwrap_or_else(|| container.to_ascii_lowercase()),
            format_aliases,
            tracks,
        })
    }
}

/// Reads a field that mediainfo may emit as string or number.
fn field(entry: &Value, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number<T: std::str::FromStr>(entry: &Value, key: &str) -> Option<T> {
    let raw = field(entry, key)?;
    // Some fields carry fractional parts ("1920.000"); keep the integer part.
    let integral = raw.split('.').next().unwrap_or(&raw);
    integral.parse().ok()
}

fn normalize_codec(kind: TrackKind, format: &str, profile: Option<&str>) -> String {
    let name = match (kind, format) {
        (TrackKind::Video, "AVC") => "h264",
        (TrackKind::Video, "HEVC") => "hevc",
        (TrackKind::Video, "VP8") => "vp8",
        (TrackKind::Video, "VP9") => "vp9",
        (TrackKind::Video, "AV1") => "av1",
        (TrackKind::Video, "MPEG-4 Visual") => "mpeg4",
        (TrackKind::Audio, "AAC") => "aac",
        (TrackKind::Audio, "MPEG Audio") if profile == Some("Layer 3") => "mp3",
        (TrackKind::Audio, "MPEG Audio") => "mp2",
        (TrackKind::Audio, "Opus") => "opus",
        (TrackKind::Audio, "Vorbis") => "vorbis",
        (TrackKind::Audio, "FLAC") => "flac",
        (TrackKind::Audio, "AC-3") => "ac3",
        (TrackKind::Audio, "E-AC-3") => "eac3",
        (TrackKind::Audio, "PCM") => "pcm_s16le",
        (TrackKind::Subtitle, "UTF-8") => "subrip",
        (TrackKind::Subtitle, "ASS") => "ass",
        _ => return format.to_ascii_lowercase(),
    };
    name.to_string()
}

fn normalize_container(format: &str) -> Vec<String> {
    let names: &[&str] = match format {
        "MPEG-4" => &["mp4", "mov", "m4a"],
        "QuickTime" => &["mov", "mp4"],
        "Matroska" => &["matroska"],
        "WebM" => &["webm", "matroska"],
        "MPEG Audio" => &["mp3"],
        "Ogg" => &["ogg", "opus"],
        "FLAC" => &["flac"],
        "Wave" => &["wav"],
        "AVI" => &["avi"],
        "MPEG-TS" => &["mpegts"],
        _ => return vec![format.to_ascii_lowercase()],
    };
    names.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl MediaProbe for MediainfoProbe {
    fn name(&self) -> &str {
        "mediainfo"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut command = Command::new(&self.config.mediainfo_path);
        command.arg("--Output=JSON").arg(path);

        let output =
            run_tool(command, &self.config.mediainfo_path, self.config.timeout_secs).await?;

        if !output.status.success() {
            return Err(ProbeError::unreadable(format!(
                "mediainfo exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let info = Self::parse_output(path, &String::from_utf8_lossy(&output.stdout))?;
        debug!(path = %path.display(), format = %info.format, "Probed media with mediainfo");
        Ok(info)
    }

    async fn validate(&self) -> Result<(), ProbeError> {
        check_tool(&self.config.mediainfo_path, "--Version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_mp4() {
        let json = r#"{
            "media": {
                "@ref": "in.mp4",
                "track": [
                    { "@type": "General", "Format": "MPEG-4", "FileSize": "1048576", "Duration": "61.440" },
                    { "@type": "Video", "Format": "AVC", "Width": "1280", "Height": "720",
                      "FrameRate": "29.970", "BitRate": "2500000" },
                    { "@type": "Audio", "Format": "AAC", "SamplingRate": "44100", "Channels": "2",
                      "BitRate": "128000", "Language": "en" }
                ]
            }
        }"#;

        let info = MediainfoProbe::parse_output(Path::new("in.mp4"), json).unwrap();
        assert_eq!(info.format, "mp4");
        assert!(info.is_container("mov"));
        assert_eq!(info.size_bytes, 1_048_576);
        assert!((info.duration_secs - 61.44).abs() < 0.001);

        let video = info.video().unwrap();
        assert_eq!(video.codec, "h264");
        assert_eq!(video.width, Some(1280));
        assert_eq!(video.bitrate_kbps, Some(2500));

        let audio = info.audio().unwrap();
        assert_eq!(audio.codec, "aac");
        assert_eq!(audio.sample_rate, Some(44100));
        assert_eq!(audio.channels, Some(2));
    }

    #[test]
    fn test_parse_output_mp3_layer3() {
        let json = r#"{
            "media": { "track": [
                { "@type": "General", "Format": "MPEG Audio", "Duration": "200.1" },
                { "@type": "Audio", "Format": "MPEG Audio", "Format_Profile": "Layer 3" }
            ] }
        }"#;
        let info = MediainfoProbe::parse_output(Path::new("a.mp3"), json).unwrap();
        assert_eq!(info.format, "mp3");
        assert_eq!(info.audio().unwrap().codec, "mp3");
    }

    #[test]
    fn test_parse_output_without_tracks_is_unreadable() {
        let json = r#"{ "media": { "track": [ { "@type": "General", "Format": "ZIP" } ] } }"#;
        let err = MediainfoProbe::parse_output(Path::new("a.zip"), json).unwrap_err();
        assert!(matches!(err, ProbeError::UnreadableMedia { .. }));
    }

    #[test]
    fn test_parse_output_null_media_is_unreadable() {
        let err = MediainfoProbe::parse_output(Path::new("x"), r#"{ "media": null }"#).unwrap_err();
        assert!(matches!(err, ProbeError::UnreadableMedia { .. }));
    }
}
