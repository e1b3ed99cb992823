pub mod config;
pub mod job;
pub mod metrics;
pub mod naming;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod scheduler;
pub mod storage;
pub mod testing;
pub mod transcoder;
pub mod transport;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    ServerConfig,
};
pub use job::{Job, JobError, JobRequest, JobStatus, OutputSpec};
pub use pipeline::{PipelineConfig, PipelineError, PipelineRunner};
pub use scheduler::{JobExecutor, JobHandle, Scheduler, SchedulerConfig, SchedulerError};
