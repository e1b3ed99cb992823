//! Mock transport for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressSink;
use crate::transport::{
    MediaRef, RemoteRef, StatusTarget, TransportAdapter, TransportError, UploadMetadata,
};

/// A recorded upload for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    /// Scratch path the file was read from.
    pub path: PathBuf,
    /// Bytes read.
    pub size_bytes: u64,
    pub metadata: UploadMetadata,
    /// Size of the attached thumbnail at upload time.
    pub thumbnail_bytes: Option<u64>,
}

/// A text message sent outside any status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: String,
    pub text: String,
    pub reply_to: Option<i64>,
}

#[derive(Debug, Default)]
struct State {
    content: Vec<u8>,
    download_errors: VecDeque<TransportError>,
    upload_errors: VecDeque<TransportError>,
    download_delay: Duration,
    upload_delay: Duration,
    fail_status_edits: bool,
    downloads: Vec<MediaRef>,
    uploads: Vec<RecordedUpload>,
    status_updates: Vec<(StatusTarget, String)>,
    messages: Vec<SentMessage>,
}

/// Mock implementation of the TransportAdapter trait.
///
/// Downloads write a fixed payload, uploads are recorded with their
/// metadata, and status edits are kept in order. Errors queued with
/// [`push_download_error`](Self::push_download_error) and
/// [`push_upload_error`](Self::push_upload_error) are returned one per
/// attempt before operations succeed again.
///
/// # Example
///
/// ```rust,ignore
/// use mediarelay_core::testing::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.push_upload_error(TransportError::connection("reset"));
///
/// // ... run a job ...
///
/// assert_eq!(transport.upload_attempts(), 2);
/// assert_eq!(transport.uploads().len(), 1);
/// ```
#[derive(Debug)]
pub struct MockTransport {
    state: Mutex<State>,
    download_attempts: AtomicU32,
    upload_attempts: AtomicU32,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                content: b"mock media payload".to_vec(),
                ..State::default()
            }),
            download_attempts: AtomicU32::new(0),
            upload_attempts: AtomicU32::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Set the bytes every download writes.
    pub fn set_content(&self, content: impl Into<Vec<u8>>) {
        self.state().content = content.into();
    }

    /// Queue an error for the next download attempt.
    pub fn push_download_error(&self, error: TransportError) {
        self.state().download_errors.push_back(error);
    }

    /// Queue an error for the next upload attempt.
    pub fn push_upload_error(&self, error: TransportError) {
        self.state().upload_errors.push_back(error);
    }

    /// Make each download take this long.
    pub fn set_download_delay(&self, delay: Duration) {
        self.state().download_delay = delay;
    }

    /// Make each upload take this long.
    pub fn set_upload_delay(&self, delay: Duration) {
        self.state().upload_delay = delay;
    }

    /// Make status edits fail.
    pub fn set_fail_status_edits(&self, fail: bool) {
        self.state().fail_status_edits = fail;
    }

    /// Media objects downloaded successfully.
    pub fn downloads(&self) -> Vec<MediaRef> {
        self.state().downloads.clone()
    }

    /// Uploads that succeeded.
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.state().uploads.clone()
    }

    /// Status texts in the order they were set.
    pub fn status_updates(&self) -> Vec<(StatusTarget, String)> {
        self.state().status_updates.clone()
    }

    /// Most recent status text.
    pub fn last_status(&self) -> Option<String> {
        self.state().status_updates.last().map(|(_, text)| text.clone())
    }

    /// Messages sent with `send_message`.
    pub fn messages(&self) -> Vec<SentMessage> {
        self.state().messages.clone()
    }

    pub fn download_attempts(&self) -> u32 {
        self.download_attempts.load(Ordering::SeqCst)
    }

    pub fn upload_attempts(&self) -> u32 {
        self.upload_attempts.load(Ordering::SeqCst)
    }
}

/// Sleeps for `delay` in two halves, reporting progress in between.
async fn simulate(
    delay: Duration,
    progress: &ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    for fraction in [0.5, 1.0] {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::cancelled()),
            _ = tokio::time::sleep(delay / 2) => {}
        }
        progress.emit(fraction, None);
    }
    Ok(())
}

#[async_trait]
impl TransportAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn download(
        &self,
        media: &MediaRef,
        dest: &Path,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, TransportError> {
        self.download_attempts.fetch_add(1, Ordering::SeqCst);
        let (error, delay, content) = {
            let mut state = self.state();
            (
                state.download_errors.pop_front(),
                state.download_delay,
                state.content.clone(),
            )
        };
        if let Some(error) = error {
            return Err(error);
        }

        simulate(delay, progress, cancel).await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &content).await?;
        self.state().downloads.push(media.clone());
        Ok(content.len() as u64)
    }

    async fn upload(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RemoteRef, TransportError> {
        let attempt = self.upload_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let (error, delay) = {
            let mut state = self.state();
            (state.upload_errors.pop_front(), state.upload_delay)
        };
        if let Some(error) = error {
            return Err(error);
        }

        let size_bytes = tokio::fs::metadata(path).await?.len();
        let thumbnail_bytes = match &metadata.thumbnail {
            Some(thumbnail) => Some(tokio::fs::metadata(thumbnail).await?.len()),
            None => None,
        };
        simulate(delay, progress, cancel).await?;

        self.state().uploads.push(RecordedUpload {
            path: path.to_path_buf(),
            size_bytes,
            metadata: metadata.clone(),
            thumbnail_bytes,
        });
        Ok(RemoteRef {
            locator: format!("remote-{}", attempt),
            message_id: Some(attempt as i64),
        })
    }

    async fn edit_status(&self, target: &StatusTarget, text: &str) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.fail_status_edits {
            return Err(TransportError::from_status(400, "message can't be edited"));
        }
        state.status_updates.push((target.clone(), text.to_string()));
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TransportError> {
        self.state().messages.push(SentMessage {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            reply_to,
        });
        Ok(())
    }
}
