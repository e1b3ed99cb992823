//! Configuration for the transport module.

use serde::{Deserialize, Serialize};

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Transport backend type
    pub backend: TransportBackend,
    /// Telegram-specific configuration (required when backend = "telegram")
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

/// Available transport backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportBackend {
    Telegram,
}

impl TransportBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
        }
    }
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub bot_token: String,
    /// Bot API base URL (a self-hosted Bot API server lifts the 20 MB download limit)
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Timeout for non-streaming API calls in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// TCP connect timeout in seconds (default: 10)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read buffer size for streamed uploads in bytes (default: 64 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_chunk_size() -> usize {
    64 * 1024
}

impl TelegramConfig {
    /// Creates a config for the public Bot API.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            chunk_size_bytes: default_chunk_size(),
        }
    }

    /// Points the transport at another Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}
