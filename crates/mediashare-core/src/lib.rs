//! Mediashare Core
//!
//! Repost pipeline for channel media: archive the inbound message, build a
//! deep link to the archived copy, and post a formatted caption with a
//! download button to the repost channel.

mod error;
pub mod handler;
pub mod link;
pub mod media;
pub mod post;

pub use error::RepostError;
pub use handler::{PostKind, RepostHandler, RepostOutcome, RepostSettings};
pub use media::{
    extract_metadata, format_file_size, FileInfo, InboundMessage, MediaAttachment, Metadata,
    VideoInfo,
};
pub use post::{format_post, format_post_with_limit, max_post_chars, FormattedPost, UrlButton};

use anyhow::Result;

/// Where an archived copy of an inbound message lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchivedReference {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Persists inbound media somewhere retrievable.
#[async_trait::async_trait]
pub trait MediaArchiver: Send + Sync {
    /// `Ok(None)` means the message was already handled or is not eligible.
    async fn save(&self, message: &InboundMessage) -> Result<Option<ArchivedReference>>;
}

/// Outbound delivery used by the repost handler.
#[async_trait::async_trait]
pub trait MessagingClient: Send + Sync {
    async fn send_photo(
        &self,
        chat_id: i64,
        photo: &str,
        caption: &str,
        button: &UrlButton,
    ) -> Result<()>;

    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        button: &UrlButton,
        disable_preview: bool,
    ) -> Result<()>;
}
