//! Transport module for exchanging media with a messaging platform.
//!
//! The `TransportAdapter` trait covers the three operations the pipeline
//! needs: fetching the input, delivering outputs, and editing a status
//! message. `TelegramTransport` implements it over the Telegram Bot API.
//!
//! Errors carry a `transient` flag and an optional platform-provided
//! `retry_after`, which the scheduler's retry policy honours.

mod config;
mod error;
mod telegram;
mod traits;
mod types;

use std::sync::Arc;

pub use config::{TelegramConfig, TransportBackend, TransportConfig};
pub use error::{TransportError, TransportErrorKind};
pub use telegram::TelegramTransport;
pub use traits::TransportAdapter;
pub use types::{MediaKind, MediaRef, RemoteRef, StatusTarget, UploadMetadata};

/// Builds the transport selected by the configuration.
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn TransportAdapter>, TransportError> {
    match config.backend {
        TransportBackend::Telegram => {
            let telegram = config.telegram.clone().ok_or_else(|| {
                TransportError::new(
                    TransportErrorKind::Unauthorized,
                    "telegram backend selected without [transport.telegram] section",
                )
            })?;
            Ok(Arc::new(TelegramTransport::new(telegram)?))
        }
    }
}
