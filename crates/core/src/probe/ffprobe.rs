//! ffprobe-based probe implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::config::ProbeConfig;
use super::error::ProbeError;
use super::runner::{check_tool, run_tool};
use super::traits::MediaProbe;
use super::types::{MediaInfo, Track, TrackKind};

/// Probe backed by `ffprobe`'s JSON output.
pub struct FfprobeProbe {
    config: ProbeConfig,
}

impl FfprobeProbe {
    /// Creates a new ffprobe probe with the given configuration.
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Creates a probe with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ProbeConfig::default())
    }

    /// Parses ffprobe JSON output into MediaInfo.
    pub(crate) fn parse_output(path: &Path, output: &str) -> Result<MediaInfo, ProbeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: Option<ProbeFormat>,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            codec_name: Option<String>,
            bit_rate: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
            #[serde(default)]
            tags: Option<ProbeTags>,
        }

        #[derive(Deserialize)]
        struct ProbeTags {
            language: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output)
            .map_err(|e| ProbeError::unreadable(format!("invalid ffprobe output: {}", e)))?;

        let format = probe
            .format
            .ok_or_else(|| ProbeError::unreadable("no container information"))?;

        let tracks: Vec<Track> = probe
            .streams
            .into_iter()
            .filter_map(|s| {
                let kind = match s.codec_type.as_deref()? {
                    "video" => TrackKind::Video,
                    "audio" => TrackKind::Audio,
                    "subtitle" => TrackKind::Subtitle,
                    _ => return None,
                };
                let codec = s.codec_name.unwrap_or_else(|| "unknown".to_string());
                // Cover art shows up as a video stream with an image codec.
                if kind == TrackKind::Video && matches!(codec.as_str(), "mjpeg" | "png" | "bmp") {
                    return None;
                }
                Some(Track {
                    kind,
                    codec,
                    width: s.width,
                    height: s.height,
                    fps: s.r_frame_rate.as_deref().and_then(parse_frame_rate),
                    bitrate_kbps: s
                        .bit_rate
                        .as_deref()
                        .and_then(|b| b.parse::<u64>().ok())
                        .map(|b| (b / 1000) as u32),
                    sample_rate: s.sample_rate.as_deref().and_then(|r| r.parse().ok()),
                    channels: s.channels,
                    language: s.tags.and_then(|t| t.language),
                })
            })
            .collect();

        if tracks.is_empty() {
            return Err(ProbeError::unreadable("no audio or video streams found"));
        }

        let format_aliases: Vec<String> = format
            .format_name
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes: format
                .size
                .as_deref()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0),
            duration_secs: format
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0),
            format: format_aliases
                .first()
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
            format_aliases,
            tracks,
        })
    }
}

/// Parses a frame rate like "24000/1001" or "30".
pub(crate) fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().ok()?;
            let den = den.parse::<f32>().ok()?;
            if den > 0.0 {
                Some(num / den)
            } else {
                None
            }
        }
        None => rate.parse::<f32>().ok(),
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut command = Command::new(&self.config.ffprobe_path);
        command
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path);

        let output = run_tool(command, &self.config.ffprobe_path, self.config.timeout_secs).await?;

        if !output.status.success() {
            return Err(ProbeError::unreadable(format!(
                "ffprobe exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let info = Self::parse_output(path, &String::from_utf8_lossy(&output.stdout))?;
        debug!(
            path = %path.display(),
            format = %info.format,
            duration = info.duration_secs,
            tracks = info.tracks.len(),
            "Probed media"
        );
        Ok(info)
    }

    async fn validate(&self) -> Result<(), ProbeError> {
        check_tool(&self.config.ffprobe_path, "-version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_video() {
        let json = r#"{
            "format": {
                "filename": "test.mkv",
                "format_name": "matroska,webm",
                "duration": "7200.0",
                "size": "5000000000"
            },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "24000/1001"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "bit_rate": "192000",
                    "sample_rate": "48000",
                    "channels": 6,
                    "tags": { "language": "eng" }
                },
                {
                    "codec_type": "subtitle",
                    "codec_name": "subrip"
                }
            ]
        }"#;

        let info = FfprobeProbe::parse_output(Path::new("test.mkv"), json).unwrap();
        assert_eq!(info.format, "matroska");
        assert!(info.is_container("webm"));
        assert_eq!(info.size_bytes, 5_000_000_000);
        assert_eq!(info.tracks.len(), 3);

        let video = info.video().unwrap();
        assert_eq!(video.codec, "h264");
        assert_eq!(video.height, Some(1080));
        assert!((video.fps.unwrap() - 23.976).abs() < 0.01);

        let audio = info.audio().unwrap();
        assert_eq!(audio.bitrate_kbps, Some(192));
        assert_eq!(audio.channels, Some(6));
        assert_eq!(audio.language.as_deref(), Some("eng"));
    }

    #[test]
    fn test_parse_output_skips_cover_art() {
        let json = r#"{
            "format": { "format_name": "mp3", "duration": "180.5" },
            "streams": [
                { "codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100" },
                { "codec_type": "video", "codec_name": "mjpeg", "width": 500, "height": 500 }
            ]
        }"#;

        let info = FfprobeProbe::parse_output(Path::new("song.mp3"), json).unwrap();
        assert!(!info.has_video());
        assert!((info.duration_secs - 180.5).abs() < 0.01);
        assert_eq!(info.size_bytes, 0);
    }

    #[test]
    fn test_parse_output_without_streams_is_unreadable() {
        let json = r#"{ "format": { "format_name": "tty" }, "streams": [] }"#;
        let err = FfprobeProbe::parse_output(Path::new("notes.txt"), json).unwrap_err();
        assert!(matches!(err, ProbeError::UnreadableMedia { .. }));
    }

    #[test]
    fn test_parse_output_garbage_is_unreadable() {
        let err = FfprobeProbe::parse_output(Path::new("x"), "not json").unwrap_err();
        assert!(matches!(err, ProbeError::UnreadableMedia { .. }));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let probe = FfprobeProbe::with_defaults();
        let err = probe.probe(Path::new("/nonexistent/file.mkv")).await.unwrap_err();
        assert!(matches!(err, ProbeError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn test_probe_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mkv");
        std::fs::write(&input, b"data").unwrap();

        let config = ProbeConfig {
            ffprobe_path: dir.path().join("no-such-ffprobe"),
            ..Default::default()
        };
        let err = FfprobeProbe::new(config).probe(&input).await.unwrap_err();
        assert!(matches!(err, ProbeError::ToolNotFound { .. }));
    }
}
