//! Trait definitions for the transport module.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressSink;

use super::error::TransportError;
use super::types::{MediaRef, RemoteRef, StatusTarget, UploadMetadata};

/// Messaging platform that media comes from and goes back to.
///
/// Implementations stream in bounded chunks, report progress through the
/// sink, and check the cancellation token between chunks.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Returns the name of this transport.
    fn name(&self) -> &str;

    /// Downloads `media` into `dest`. Returns the number of bytes written.
    async fn download(
        &self,
        media: &MediaRef,
        dest: &Path,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, TransportError>;

    /// Uploads the file at `path`.
    async fn upload(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RemoteRef, TransportError>;

    /// Replaces the text of a status message.
    async fn edit_status(&self, target: &StatusTarget, text: &str) -> Result<(), TransportError>;

    /// Sends a new text message to `chat_id`, optionally as a reply.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TransportError>;
}
