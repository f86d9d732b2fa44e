//! Bot API payloads consumed by the adapter

use mediashare_core::{FileInfo, InboundMessage, MediaAttachment, VideoInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub channel_post: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<TelegramPhotoSize>>,
    #[serde(default)]
    pub document: Option<TelegramDocument>,
    #[serde(default)]
    pub video: Option<TelegramVideo>,
    #[serde(default)]
    pub audio: Option<serde_json::Value>,
    #[serde(default)]
    pub voice: Option<serde_json::Value>,
    #[serde(default)]
    pub video_note: Option<serde_json::Value>,
    #[serde(default)]
    pub sticker: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    pub width: i64,
    pub height: i64,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramDocument {
    pub file_id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramVideo {
    pub file_id: String,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default, alias = "thumb")]
    pub thumbnail: Option<TelegramPhotoSize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: Option<bool>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessageId {
    pub message_id: i64,
}

fn non_negative(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

impl TelegramMessage {
    pub fn is_private(&self) -> bool {
        self.chat.chat_type == "private"
    }

    pub fn media(&self) -> MediaAttachment {
        if let Some(doc) = &self.document {
            return MediaAttachment::Document(FileInfo {
                file_name: doc.file_name.clone(),
                file_size: non_negative(doc.file_size),
                mime_type: doc.mime_type.clone(),
            });
        }

        if let Some(video) = &self.video {
            return MediaAttachment::Video(VideoInfo {
                file: FileInfo {
                    file_name: video.file_name.clone(),
                    file_size: non_negative(video.file_size),
                    mime_type: video.mime_type.clone(),
                },
                duration: non_negative(video.duration),
                thumbnails: video
                    .thumbnail
                    .iter()
                    .map(|thumb| thumb.file_id.clone())
                    .collect(),
            });
        }

        let has_other = self.photo.as_ref().is_some_and(|sizes| !sizes.is_empty())
            || self.audio.is_some()
            || self.voice.is_some()
            || self.video_note.is_some()
            || self.sticker.is_some();

        if has_other {
            MediaAttachment::Other
        } else {
            MediaAttachment::None
        }
    }
}

impl From<&TelegramMessage> for InboundMessage {
    fn from(message: &TelegramMessage) -> Self {
        InboundMessage {
            chat_id: message.chat.id,
            message_id: message.message_id,
            caption: message.caption.clone(),
            media: message.media(),
        }
    }
}
