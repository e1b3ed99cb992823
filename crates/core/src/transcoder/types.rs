//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Video codec specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// VP9
    Vp9,
    /// AV1
    Av1,
}

impl VideoCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libaom-av1",
        }
    }

    /// Returns the codec name as reported by probing tools.
    pub fn probe_name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "hevc",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
        }
    }

    /// Whether a probed codec name denotes this codec.
    pub fn matches(&self, codec: &str) -> bool {
        let codec = codec.to_ascii_lowercase();
        match self {
            Self::H265 => codec == "hevc" || codec == "h265",
            _ => codec == self.probe_name(),
        }
    }

    /// Whether the encoder honours `-crf`.
    pub fn supports_crf(&self) -> bool {
        matches!(self, Self::H264 | Self::H265 | Self::Vp9 | Self::Av1)
    }
}

/// Audio codec specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// Advanced Audio Coding
    Aac,
    /// MPEG Audio Layer III
    Mp3,
    /// Opus
    Opus,
    /// Vorbis
    Vorbis,
    /// Free Lossless Audio Codec
    Flac,
    /// Uncompressed 16-bit PCM
    Pcm,
}

impl AudioCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Mp3 => "libmp3lame",
            Self::Opus => "libopus",
            Self::Vorbis => "libvorbis",
            Self::Flac => "flac",
            Self::Pcm => "pcm_s16le",
        }
    }

    /// Returns the codec name as reported by probing tools.
    pub fn probe_name(&self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Pcm => "pcm_s16le",
        }
    }

    /// Whether a probed codec name denotes this codec.
    pub fn matches(&self, codec: &str) -> bool {
        let codec = codec.to_ascii_lowercase();
        match self {
            Self::Pcm => codec.starts_with("pcm_"),
            _ => codec == self.probe_name(),
        }
    }

    /// Whether this codec is lossless (bitrate is meaningless).
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Pcm)
    }
}

/// Container format for output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    /// MPEG-4 Part 14 (.mp4)
    Mp4,
    /// Matroska (.mkv)
    Mkv,
    /// WebM
    Webm,
    /// Bare MP3 stream
    Mp3,
    /// MPEG-4 audio (.m4a)
    M4a,
    /// Ogg
    Ogg,
    /// Ogg Opus (.opus)
    Opus,
    /// FLAC
    Flac,
    /// WAVE
    Wav,
    /// Single JPEG frame (thumbnails)
    Jpeg,
}

impl ContainerFormat {
    /// Returns the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Jpeg => "jpg",
        }
    }

    /// Returns the ffmpeg muxer name (`-f`).
    pub fn muxer(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "matroska",
            Self::Webm => "webm",
            Self::Mp3 => "mp3",
            Self::M4a => "ipod",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Jpeg => "image2",
        }
    }

    /// Name under which probing tools report this container.
    pub fn probe_name(&self) -> &'static str {
        match self {
            Self::Mkv => "matroska",
            Self::Jpeg => "image2",
            other => other.extension(),
        }
    }

    /// Whether the container can hold a video stream.
    pub fn allows_video(&self) -> bool {
        !self.allowed_video_codecs().is_empty()
    }

    /// Video codecs this container accepts.
    pub fn allowed_video_codecs(&self) -> &'static [VideoCodec] {
        match self {
            Self::Mp4 => &[VideoCodec::H264, VideoCodec::H265, VideoCodec::Av1],
            Self::Mkv => &[VideoCodec::H264, VideoCodec::H265, VideoCodec::Vp9, VideoCodec::Av1],
            Self::Webm => &[VideoCodec::Vp9, VideoCodec::Av1],
            _ => &[],
        }
    }

    /// Audio codecs this container accepts.
    pub fn allowed_audio_codecs(&self) -> &'static [AudioCodec] {
        match self {
            Self::Mp4 => &[AudioCodec::Aac, AudioCodec::Mp3, AudioCodec::Opus],
            Self::Mkv => &[
                AudioCodec::Aac,
                AudioCodec::Mp3,
                AudioCodec::Opus,
                AudioCodec::Vorbis,
                AudioCodec::Flac,
                AudioCodec::Pcm,
            ],
            Self::Webm => &[AudioCodec::Opus, AudioCodec::Vorbis],
            Self::Mp3 => &[AudioCodec::Mp3],
            Self::M4a => &[AudioCodec::Aac],
            Self::Ogg => &[AudioCodec::Vorbis, AudioCodec::Opus],
            Self::Opus => &[AudioCodec::Opus],
            Self::Flac => &[AudioCodec::Flac],
            Self::Wav => &[AudioCodec::Pcm],
            Self::Jpeg => &[],
        }
    }
}

/// Quality target for re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Quality {
    /// Encoder defaults.
    #[default]
    Default,
    /// Constant Rate Factor (lower = better).
    Crf(u8),
    /// Target bitrate in kbps. Applies to video when present, otherwise audio.
    BitrateKbps(u32),
}

/// A clip of the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Offset into the input in seconds.
    pub start_secs: f64,
    /// Clip length in seconds. `None` runs to the end of the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

/// Metadata to embed in the output file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedMetadata {
    /// Container title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Artist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Title applied to every video stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    /// Title applied to every audio stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_title: Option<String>,
    /// Title applied to every subtitle stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_title: Option<String>,
    /// Additional container-level fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl EmbeddedMetadata {
    /// Convert to ffmpeg metadata arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        let container_fields = [
            ("title", &self.title),
            ("artist", &self.artist),
            ("author", &self.author),
        ];
        for (key, value) in container_fields {
            if let Some(value) = value {
                args.extend(["-metadata".to_string(), format!("{}={}", key, value)]);
            }
        }

        let stream_fields = [
            ("-metadata:s:v", &self.video_title),
            ("-metadata:s:a", &self.audio_title),
            ("-metadata:s:s", &self.subtitle_title),
        ];
        for (flag, value) in stream_fields {
            if let Some(value) = value {
                args.extend([flag.to_string(), format!("title={}", value)]);
            }
        }

        for (key, value) in &self.extra {
            args.extend(["-metadata".to_string(), format!("{}={}", key, value)]);
        }

        args
    }

    /// Whether there is nothing to embed.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.author.is_none()
            && self.video_title.is_none()
            && self.audio_title.is_none()
            && self.subtitle_title.is_none()
            && self.extra.is_empty()
    }
}

/// How the transcoder decided to produce an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Stream copy into the target container.
    Remux,
    /// Full decode and re-encode.
    Encode,
    /// Single-frame extraction.
    Thumbnail,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remux => "remux",
            Self::Encode => "encode",
            Self::Thumbnail => "thumbnail",
        }
    }
}

/// Result of a successful transcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeOutput {
    /// Output file path.
    pub path: PathBuf,
    /// Output file size in bytes.
    pub size_bytes: u64,
    /// Plan that produced the file.
    pub plan: PlanKind,
    /// Wall-clock time spent in milliseconds.
    pub elapsed_ms: u64,
}
