//! Transcoder module for producing output files with FFmpeg.
//!
//! Each output is produced by one of three plans:
//!
//! - **Remux**: every kept stream is copied (`-c copy`) into the target container.
//!   Chosen when the source codecs are allowed in the container, no range is cut
//!   and no downscale is needed.
//! - **Encode**: at least one stream is re-encoded.
//! - **Thumbnail**: a single JPEG frame, scaled to fit a 320px box.
//!
//! # Example
//!
//! ```ignore
//! use mediarelay_core::transcoder::{FfmpegTranscoder, Transcoder, ContainerFormat};
//! use mediarelay_core::job::OutputSpec;
//!
//! let transcoder = FfmpegTranscoder::with_defaults();
//! transcoder.validate().await?;
//!
//! let spec = OutputSpec::new(ContainerFormat::Mp4).with_max_height(720);
//! let output = transcoder
//!     .run(&input, &scratch.join("out.mp4"), &spec, &info, &sink, &cancel)
//!     .await?;
//! println!("{} in {} ms", output.plan.as_str(), output.elapsed_ms);
//! ```

mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod plan;
mod progress;
mod traits;
mod types;

pub use capabilities::EncoderCapabilities;
pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use ffmpeg::FfmpegTranscoder;
pub(crate) use plan::effective_duration;
pub use plan::{ExecutionPlan, StreamPlan};
pub use traits::Transcoder;
pub use types::{
    AudioCodec, ContainerFormat, EmbeddedMetadata, PlanKind, Quality, TimeRange, TranscodeOutput,
    VideoCodec,
};
