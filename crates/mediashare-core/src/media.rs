//! Inbound media model and metadata extraction

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoInfo {
    pub file: FileInfo,
    pub duration: Option<u64>,
    /// Thumbnail file ids, best candidate first.
    pub thumbnails: Vec<String>,
}

/// Media carried by an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MediaAttachment {
    #[default]
    None,
    Document(FileInfo),
    Video(VideoInfo),
    /// Photos, audio, voice notes and anything else without file metadata.
    Other,
}

impl MediaAttachment {
    pub fn is_media(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Document(_) => "document",
            Self::Video(_) => "video",
            Self::Other => "other",
        }
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        match self {
            Self::Document(file) => Some(file),
            Self::Video(video) => Some(&video.file),
            Self::None | Self::Other => None,
        }
    }

    pub fn duration(&self) -> Option<u64> {
        match self {
            Self::Video(video) => video.duration,
            _ => None,
        }
    }

    pub fn thumbnail(&self) -> Option<&str> {
        match self {
            Self::Video(video) => video.thumbnails.first().map(String::as_str),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub caption: Option<String>,
    pub media: MediaAttachment,
}

impl InboundMessage {
    pub fn has_media(&self) -> bool {
        self.media.is_media()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: String,
    pub file_size: String,
    pub mime_type: String,
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
}

pub fn extract_metadata(message: &InboundMessage) -> Metadata {
    let file = message.media.file_info();

    let title = message
        .caption
        .as_deref()
        .filter(|caption| !caption.is_empty())
        .or_else(|| file.and_then(|f| f.file_name.as_deref()))
        .unwrap_or_default()
        .to_string();

    Metadata {
        title,
        file_size: file
            .and_then(|f| f.file_size)
            .map(format_file_size)
            .unwrap_or_default(),
        mime_type: file
            .and_then(|f| f.mime_type.clone())
            .unwrap_or_default(),
        duration: message.media.duration(),
        thumbnail: message.media.thumbnail().map(str::to_string),
    }
}

pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}
