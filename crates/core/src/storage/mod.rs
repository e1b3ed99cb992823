//! Scratch storage for running jobs.
//!
//! Every job works inside `<scratch_root>/<job-id>/`. The directory is owned by
//! a `JobScratch` guard and removed when the guard is released or dropped, so
//! no exit path leaves files behind. At startup `StorageArena::init` sweeps
//! directories left by a crashed process.

mod arena;
mod config;
mod error;

pub use arena::{JobScratch, ScratchFile, ScratchRole, StorageArena, SweepReport};
pub use config::StorageConfig;
pub use error::StorageError;
