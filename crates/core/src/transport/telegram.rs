//! Telegram Bot API transport.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::progress::{estimate_eta, ProgressSink};

use super::config::TelegramConfig;
use super::error::{TransportError, TransportErrorKind};
use super::traits::TransportAdapter;
use super::types::{MediaKind, MediaRef, RemoteRef, StatusTarget, UploadMetadata};

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_size: Option<u64>,
    file_path: Option<String>,
}

/// Transport speaking the Telegram Bot API over HTTPS.
pub struct TelegramTransport {
    client: Client,
    config: TelegramConfig,
}

impl TelegramTransport {
    /// Creates a new Telegram transport.
    pub fn new(config: TelegramConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url(), self.config.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.base_url(),
            self.config.bot_token,
            file_path.trim_start_matches('/')
        )
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// Sends a request and unwraps the Bot API envelope.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        parse_response(status, &body)
    }

    /// Checks the token by calling `getMe`. Returns the bot's username.
    pub async fn get_me(&self) -> Result<String, TransportError> {
        let me: Value = self
            .call(
                self.client
                    .get(self.method_url("getMe"))
                    .timeout(self.request_timeout()),
            )
            .await?;
        Ok(me
            .get("username")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn resolve_file(&self, media: &MediaRef) -> Result<TelegramFile, TransportError> {
        self.call(
            self.client
                .get(self.method_url("getFile"))
                .query(&[("file_id", media.locator.as_str())])
                .timeout(self.request_timeout()),
        )
        .await
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<u64>,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::from_status(
                status.as_u16(),
                format!("file download failed with HTTP {}", status.as_u16()),
            ));
        }

        let total = response.content_length().or(expected);
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let started = Instant::now();
        let mut written: u64 = 0;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::cancelled()),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if let Some(total) = total.filter(|t| *t > 0) {
                let fraction = written as f32 / total as f32;
                progress.emit(fraction, estimate_eta(fraction, started.elapsed()));
            }
        }

        file.flush().await?;
        Ok(written)
    }

    async fn send_media(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
        progress: &ProgressSink,
    ) -> Result<RemoteRef, TransportError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();

        let sink = progress.clone();
        let started = Instant::now();
        let mut sent: u64 = 0;
        let stream = ReaderStream::with_capacity(file, self.config.chunk_size_bytes.max(4096)).map(
            move |chunk| {
                if let Ok(bytes) = &chunk {
                    sent += bytes.len() as u64;
                    if size > 0 {
                        let fraction = sent as f32 / size as f32;
                        sink.emit(fraction, estimate_eta(fraction, started.elapsed()));
                    }
                }
                chunk
            },
        );

        let (method, field) = upload_method(metadata.send_as);
        let media_part =
            Part::stream_with_length(Body::wrap_stream(stream), size).file_name(metadata.file_name.clone());

        let mut form = Form::new()
            .text("chat_id", metadata.chat_id.clone())
            .part(field, media_part);

        if let Some(caption) = &metadata.caption {
            form = form.text("caption", caption.clone());
        }
        if let Some(reply_to) = metadata.reply_to {
            form = form.text("reply_to_message_id", reply_to.to_string());
        }
        if matches!(metadata.send_as, MediaKind::Video | MediaKind::Audio) {
            if let Some(duration) = metadata.duration_secs {
                form = form.text("duration", duration.to_string());
            }
        }
        if metadata.send_as == MediaKind::Video {
            if let (Some(width), Some(height)) = (metadata.width, metadata.height) {
                form = form
                    .text("width", width.to_string())
                    .text("height", height.to_string());
            }
            form = form.text("supports_streaming", "true");
        }
        if metadata.send_as != MediaKind::Photo {
            if let Some(thumbnail) = &metadata.thumbnail {
                let thumb = tokio::fs::File::open(thumbnail).await?;
                let thumb_size = thumb.metadata().await?.len();
                let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(thumb)), thumb_size)
                    .file_name("thumbnail.jpg");
                form = form.part("thumbnail", part);
            }
        }

        let message: Value = self
            .call(self.client.post(self.method_url(method)).multipart(form))
            .await?;

        let locator = extract_file_id(&message, metadata.send_as)
            .ok_or_else(|| TransportError::protocol("sent message carries no file"))?;

        Ok(RemoteRef {
            locator,
            message_id: message.get("message_id").and_then(Value::as_i64),
        })
    }
}

/// Unwraps a Bot API response body.
fn parse_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, TransportError> {
    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(TransportError::protocol(format!("invalid response: {}", e)));
        }
        Err(_) => {
            return Err(TransportError::from_status(
                status,
                format!("HTTP {}", status),
            ));
        }
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| TransportError::protocol("response without result"));
    }

    let code = envelope.error_code.unwrap_or(status);
    let description = envelope
        .description
        .unwrap_or_else(|| format!("HTTP {}", code));
    let mut error = TransportError::from_status(code, description);
    if let Some(secs) = envelope.parameters.and_then(|p| p.retry_after) {
        error = error.with_retry_after(Duration::from_secs(secs));
    }
    Err(error)
}

/// Bot API method and form field for a presentation.
fn upload_method(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Video => ("sendVideo", "video"),
        MediaKind::Audio => ("sendAudio", "audio"),
        MediaKind::Document => ("sendDocument", "document"),
        MediaKind::Photo => ("sendPhoto", "photo"),
    }
}

/// Finds the file id in a sent message.
///
/// Telegram may deliver a video as a document when it cannot stream it, so
/// every media field is checked.
fn extract_file_id(message: &Value, kind: MediaKind) -> Option<String> {
    let preferred = upload_method(kind).1;
    let fields = [preferred, "video", "audio", "document", "animation", "photo"];

    fields.iter().find_map(|field| {
        let media = message.get(*field)?;
        let media = match media.as_array() {
            // Photos come as a list of sizes; the last one is the largest.
            Some(sizes) => sizes.last()?,
            None => media,
        };
        media
            .get("file_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

/// `sendMessage` payload. A missing reply target is sent without one.
fn message_body(chat_id: &str, text: &str, reply_to: Option<i64>) -> Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });
    if let Some(message_id) = reply_to {
        body["reply_parameters"] = serde_json::json!({
            "message_id": message_id,
            "allow_sending_without_reply": true,
        });
    }
    body
}

fn is_not_modified(error: &TransportError) -> bool {
    error.kind == TransportErrorKind::BadRequest && error.message.contains("message is not modified")
}

#[async_trait]
impl TransportAdapter for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn download(
        &self,
        media: &MediaRef,
        dest: &Path,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, TransportError> {
        let file = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::cancelled()),
            file = self.resolve_file(media) => file?,
        };
        let file_path = file.file_path.ok_or_else(|| {
            TransportError::new(TransportErrorKind::TooLarge, "file is not downloadable")
        })?;

        let expected = file.file_size.or(media.size_hint);
        let url = self.file_url(&file_path);
        let result = self
            .stream_to_file(&url, dest, expected, progress, cancel)
            .await;

        match result {
            Ok(bytes) => {
                progress.complete();
                debug!(locator = %media.locator, bytes, "Downloaded media");
                Ok(bytes)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(dest).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %dest.display(), error = %rm, "Failed to remove partial download");
                    }
                }
                Err(e)
            }
        }
    }

    async fn upload(
        &self,
        path: &Path,
        metadata: &UploadMetadata,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RemoteRef, TransportError> {
        let remote = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::cancelled()),
            remote = self.send_media(path, metadata, progress) => remote?,
        };
        progress.complete();
        debug!(
            file_name = %metadata.file_name,
            send_as = metadata.send_as.as_str(),
            "Uploaded media"
        );
        Ok(remote)
    }

    async fn edit_status(&self, target: &StatusTarget, text: &str) -> Result<(), TransportError> {
        let body = serde_json::json!({
            "chat_id": target.chat_id,
            "message_id": target.message_id,
            "text": text,
        });

        let result: Result<Value, _> = self
            .call(
                self.client
                    .post(self.method_url("editMessageText"))
                    .json(&body)
                    .timeout(self.request_timeout()),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TransportError> {
        let body = message_body(chat_id, text, reply_to);
        let _: Value = self
            .call(
                self.client
                    .post(self.method_url("sendMessage"))
                    .json(&body)
                    .timeout(self.request_timeout()),
            )
            .await?;
        Ok(())
    }
}
