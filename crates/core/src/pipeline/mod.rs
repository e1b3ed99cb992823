//! Pipeline orchestrator.
//!
//! [`PipelineRunner`] is the scheduler's [`JobExecutor`](crate::scheduler::JobExecutor).
//! For each job it downloads the input once, probes it once, then produces
//! every output (transcode, then upload) under the configured
//! [`OutputPolicy`]. Scratch space is released on every exit path and the
//! requester gets exactly one final status text.
//!
//! A job with at least one delivered output ends `Done` and lists the
//! outputs that failed; a job with none ends `Failed`. With `fail_fast` the
//! first output failure fails the job and skips the rest.

mod config;
mod error;
mod runner;

pub use config::{OutputMode, OutputPolicy, PipelineConfig};
pub use error::PipelineError;
pub use runner::{render_outcome, PipelineRunner};
