//! Types for the transport module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a media object is presented on the messaging platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Playable video.
    Video,
    /// Playable audio.
    Audio,
    /// Generic file attachment.
    #[default]
    Document,
    /// Still image.
    Photo,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Photo => "photo",
        }
    }
}

/// Reference to a media object held by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef {
    /// Transport-specific locator (a Telegram `file_id`).
    pub locator: String,
    /// Original file name, when the sender supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Announced size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<u64>,
    /// How the object was sent.
    #[serde(default)]
    pub kind: MediaKind,
}

impl MediaRef {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            file_name: None,
            size_hint: None,
            kind: MediaKind::Document,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = kind;
        self
    }

    /// File name to use locally, falling back to the locator.
    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(&self.locator)
    }
}

/// Message whose text shows the status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusTarget {
    /// Chat the message lives in.
    pub chat_id: String,
    /// Message to edit.
    pub message_id: i64,
}

impl StatusTarget {
    pub fn new(chat_id: impl Into<String>, message_id: i64) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id,
        }
    }
}

/// Everything the transport needs to deliver one output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Destination chat.
    pub chat_id: String,
    /// File name shown to the recipient.
    pub file_name: String,
    /// Presentation.
    pub send_as: MediaKind,
    /// Caption text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Local thumbnail to attach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PathBuf>,
    /// Duration in whole seconds (video/audio).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// Frame width (video).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Frame height (video).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Message to reply to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
}

impl UploadMetadata {
    pub fn new(chat_id: impl Into<String>, file_name: impl Into<String>, send_as: MediaKind) -> Self {
        Self {
            chat_id: chat_id.into(),
            file_name: file_name.into(),
            send_as,
            caption: None,
            thumbnail: None,
            duration_secs: None,
            width: None,
            height: None,
            reply_to: None,
        }
    }
}

/// Reference to a delivered object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    /// Locator of the uploaded object.
    pub locator: String,
    /// Message carrying it, when the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}
