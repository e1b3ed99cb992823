//! Probe module for extracting technical metadata from media files.
//!
//! Two backends are available behind the `MediaProbe` trait:
//! - `FfprobeProbe`: `ffprobe -print_format json -show_format -show_streams`
//! - `MediainfoProbe`: `mediainfo --Output=JSON`
//!
//! Both normalise codec and container names to ffmpeg vocabulary and run the
//! tool under a deadline, killing it when the deadline passes.

mod config;
mod error;
mod ffprobe;
mod mediainfo;
mod runner;
mod traits;
mod types;

use std::sync::Arc;

pub use config::{ProbeBackend, ProbeConfig};
pub use error::ProbeError;
pub use ffprobe::FfprobeProbe;
pub use mediainfo::MediainfoProbe;
pub use traits::MediaProbe;
pub use types::{MediaInfo, Track, TrackKind};

/// Builds the probe selected by the configuration.
pub fn create_probe(config: &ProbeConfig) -> Arc<dyn MediaProbe> {
    match config.backend {
        ProbeBackend::Ffprobe => Arc::new(FfprobeProbe::new(config.clone())),
        ProbeBackend::Mediainfo => Arc::new(MediainfoProbe::new(config.clone())),
    }
}
