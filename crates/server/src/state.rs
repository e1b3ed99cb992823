use std::sync::Arc;

use mediarelay_core::pipeline::PipelineRunner;
use mediarelay_core::probe::MediaProbe;
use mediarelay_core::storage::StorageArena;
use mediarelay_core::transcoder::Transcoder;
use mediarelay_core::transport::TransportAdapter;
use mediarelay_core::{Config, SanitizedConfig, Scheduler};

/// Pipeline over the configured backends.
pub type Relay = PipelineRunner<dyn MediaProbe, dyn Transcoder, dyn TransportAdapter>;

/// Shared application state
pub struct AppState {
    config: Config,
    scheduler: Arc<Scheduler<Relay>>,
    storage: StorageArena,
}

impl AppState {
    pub fn new(config: Config, scheduler: Arc<Scheduler<Relay>>, storage: StorageArena) -> Self {
        Self {
            config,
            scheduler,
            storage,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn scheduler(&self) -> &Scheduler<Relay> {
        &self.scheduler
    }

    /// Jobs currently holding a scratch directory.
    pub fn scratch_in_use(&self) -> usize {
        self.storage.active_jobs()
    }
}
