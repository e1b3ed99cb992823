//! HTTP intake for the relay: job submission, status and metrics.

pub mod api;
pub mod metrics;
pub mod state;
