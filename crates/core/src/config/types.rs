use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::pipeline::PipelineConfig;
use crate::probe::ProbeConfig;
use crate::progress::ProgressConfig;
use crate::scheduler::SchedulerConfig;
use crate::storage::StorageConfig;
use crate::transcoder::TranscoderConfig;
use crate::transport::{TransportBackend, TransportConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    pub transport: TransportConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Time running jobs get to wind down on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_grace() -> u64 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineConfig,
    pub probe: ProbeConfig,
    pub transcoder: TranscoderConfig,
    pub storage: StorageConfig,
    pub progress: ProgressConfig,
    pub transport: SanitizedTransportConfig,
}

/// Sanitized transport config (bot token redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTransportConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<SanitizedTelegramConfig>,
}

/// Sanitized Telegram config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelegramConfig {
    pub api_base: String,
    pub bot_token_configured: bool,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub chunk_size_bytes: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            scheduler: config.scheduler.clone(),
            pipeline: config.pipeline.clone(),
            probe: config.probe.clone(),
            transcoder: config.transcoder.clone(),
            storage: config.storage.clone(),
            progress: config.progress.clone(),
            transport: SanitizedTransportConfig {
                backend: match config.transport.backend {
                    TransportBackend::Telegram => "telegram".to_string(),
                },
                telegram: config
                    .transport
                    .telegram
                    .as_ref()
                    .map(|t| SanitizedTelegramConfig {
                        api_base: t.api_base.clone(),
                        bot_token_configured: !t.bot_token.trim().is_empty(),
                        request_timeout_secs: t.request_timeout_secs,
                        connect_timeout_secs: t.connect_timeout_secs,
                        chunk_size_bytes: t.chunk_size_bytes,
                    }),
            },
        }
    }
}
