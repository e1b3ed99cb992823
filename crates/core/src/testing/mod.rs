//! Testing utilities and mock implementations.
//!
//! Mocks for the three external seams (transport, probe, transcoder) let the
//! pipeline and scheduler run end to end without ffmpeg or a bot token.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediarelay_core::testing::{fixtures, MockProbe, MockTranscoder, MockTransport};
//!
//! let transport = Arc::new(MockTransport::new());
//! let probe = Arc::new(MockProbe::new());
//! let transcoder = Arc::new(MockTranscoder::new());
//!
//! // Configure mock behaviour
//! transport.push_download_error(TransportError::timeout("slow"));
//! transcoder.fail_container(ContainerFormat::Webm);
//!
//! // Build a PipelineRunner from them...
//! ```

mod mock_probe;
mod mock_transcoder;
mod mock_transport;

pub use mock_probe::MockProbe;
pub use mock_transcoder::{MockTranscoder, RecordedTranscode};
pub use mock_transport::{MockTransport, RecordedUpload, SentMessage};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::job::{JobRequest, OutputSpec, Priority};
    use crate::probe::{MediaInfo, Track, TrackKind};
    use crate::transcoder::ContainerFormat;
    use crate::transport::{MediaKind, MediaRef, StatusTarget};

    /// A 60 s 1280x720 H.264/AAC MP4.
    pub fn video_info() -> MediaInfo {
        let mut video = Track::new(TrackKind::Video, "h264");
        video.width = Some(1280);
        video.height = Some(720);
        video.fps = Some(25.0);
        video.bitrate_kbps = Some(2500);

        let mut audio = Track::new(TrackKind::Audio, "aac");
        audio.sample_rate = Some(48_000);
        audio.channels = Some(2);
        audio.bitrate_kbps = Some(128);

        MediaInfo {
            path: PathBuf::from("input"),
            size_bytes: 1024 * 1024 * 20, // 20 MB
            duration_secs: 60.0,
            format: "mov".to_string(),
            format_aliases: vec!["mov".into(), "mp4".into(), "m4a".into()],
            tracks: vec![video, audio],
        }
    }

    /// A 3 minute MP3 with no video.
    pub fn audio_info() -> MediaInfo {
        let mut audio = Track::new(TrackKind::Audio, "mp3");
        audio.sample_rate = Some(44_100);
        audio.channels = Some(2);
        audio.bitrate_kbps = Some(320);

        MediaInfo {
            path: PathBuf::from("input"),
            size_bytes: 1024 * 1024 * 7,
            duration_secs: 180.0,
            format: "mp3".to_string(),
            format_aliases: vec!["mp3".into()],
            tracks: vec![audio],
        }
    }

    /// A video input named like a TV episode.
    pub fn media_ref(locator: &str) -> MediaRef {
        MediaRef::new(locator)
            .with_file_name("Show.Name.S01E02.720p.mp4")
            .with_size(1024 * 1024 * 20)
            .with_kind(MediaKind::Video)
    }

    /// The message that tracks a job in chat `42`.
    pub fn status_target() -> StatusTarget {
        StatusTarget::new("42", 1000)
    }

    /// A request for the given outputs with a status message attached.
    pub fn request(requester: &str, locator: &str, outputs: Vec<OutputSpec>) -> JobRequest {
        JobRequest {
            requester: requester.to_string(),
            chat_id: "42".to_string(),
            input: media_ref(locator),
            outputs,
            priority: Priority::Normal,
            status_target: Some(status_target()),
            reply_to: Some(999),
        }
    }

    /// A request for a single MP4 output.
    pub fn mp4_request(requester: &str, locator: &str) -> JobRequest {
        request(requester, locator, vec![OutputSpec::new(ContainerFormat::Mp4)])
    }
}
