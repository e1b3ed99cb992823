//! Progress tracking for running jobs.
//!
//! Stages report through a [`ProgressSink`], which keeps fractions
//! non-decreasing. Sinks attached to a [`ProgressHandle`] feed the
//! [`ProgressReporter`] task, which turns the stream into occasional status
//! message edits on the transport.

mod config;
mod reporter;
mod sink;
mod types;

pub use config::ProgressConfig;
pub use reporter::{format_eta, render_status, ProgressHandle, ProgressReporter};
pub use sink::ProgressSink;
pub use types::{estimate_eta, ProgressEvent, Stage};
