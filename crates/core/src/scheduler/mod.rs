//! Job admission, queueing and dispatch.
//!
//! Submissions pass validation, a duplicate check and two in-flight ceilings
//! (global and per requester) before they enter a priority queue. A fixed
//! pool of workers pops jobs and hands them to a [`JobExecutor`]. Admission
//! slots are held until the job reaches a terminal state.

mod admission;
mod config;
mod error;
mod queue;
mod retry;
mod runner;

pub use admission::{AdmissionPermit, AdmissionState};
pub use config::{RetryConfig, SchedulerConfig};
pub use error::{CapacityScope, SchedulerError};
pub use queue::JobQueue;
pub use retry::{RetryPolicy, Retryable};
pub use runner::{JobContext, JobExecutor, JobHandle, Scheduler, SchedulerStatus};
