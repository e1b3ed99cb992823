//! Job model and lifecycle state machine.
//!
//! ```text
//! Queued -> Downloading -> Probing -> Transcoding <-> Uploading -> Done
//!    \            \            \            \             \
//!     +------------+------------+------------+-------------+--> Failed | Cancelled
//! ```
//!
//! `Uploading -> Transcoding` moves on to the next output of a multi-output
//! job. Terminal states never change.

mod error;
mod types;
mod validate;

pub use error::JobError;
pub use types::{
    FailureKind, Job, JobFailure, JobRequest, JobStatus, OutputResult, OutputSpec, OutputStatus,
    Priority,
};
pub use validate::{admit, validate_output, validate_request};
