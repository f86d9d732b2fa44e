//! Per-message repost orchestration

use crate::error::RepostError;
use crate::link::share_link;
use crate::media::{extract_metadata, InboundMessage};
use crate::post::{format_post_with_limit, max_post_chars};
use crate::{MediaArchiver, MessagingClient};
use mediashare_config::{Config, UnroutedPolicy};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepostSettings {
    pub bot_username: String,
    pub link_prefix: String,
    pub destination: Option<i64>,
    pub unrouted: UnroutedPolicy,
}

impl RepostSettings {
    pub fn from_config(config: &Config, bot_username: &str) -> Self {
        Self {
            bot_username: bot_username.trim_start_matches('@').to_string(),
            link_prefix: config.archive.link_prefix.trim().to_string(),
            destination: config.repost.channel_id,
            unrouted: config.repost.unrouted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Photo,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepostOutcome {
    NoMedia,
    /// The archiver declined the message.
    NotArchived,
    /// Built but dropped: no destination and the discard policy is active.
    Discarded { archived_id: i64 },
    Posted {
        archived_id: i64,
        destination: i64,
        kind: PostKind,
    },
}

pub struct RepostHandler {
    archiver: Arc<dyn MediaArchiver>,
    client: Arc<dyn MessagingClient>,
    settings: RepostSettings,
}

impl RepostHandler {
    pub fn new(
        archiver: Arc<dyn MediaArchiver>,
        client: Arc<dyn MessagingClient>,
        settings: RepostSettings,
    ) -> Self {
        Self {
            archiver,
            client,
            settings,
        }
    }

    pub async fn handle_new_message(
        &self,
        message: &InboundMessage,
    ) -> Result<RepostOutcome, RepostError> {
        if !message.has_media() {
            return Ok(RepostOutcome::NoMedia);
        }

        let Some(archived) = self
            .archiver
            .save(message)
            .await
            .map_err(RepostError::archive)?
        else {
            debug!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                "archiver skipped message"
            );
            return Ok(RepostOutcome::NotArchived);
        };

        let metadata = extract_metadata(message);
        let link = share_link(
            &self.settings.bot_username,
            &self.settings.link_prefix,
            archived.message_id,
        );
        let post = format_post_with_limit(
            &link,
            &metadata,
            &self.settings.bot_username,
            max_post_chars(&metadata),
        );

        let Some(destination) = self.settings.destination else {
            return match self.settings.unrouted {
                UnroutedPolicy::Discard => {
                    debug!(
                        archived_id = archived.message_id,
                        "no repost channel configured, post discarded"
                    );
                    Ok(RepostOutcome::Discarded {
                        archived_id: archived.message_id,
                    })
                }
                UnroutedPolicy::Error => Err(RepostError::NoDestination(archived.message_id)),
            };
        };

        let kind = if let Some(thumb) = metadata.thumbnail.as_deref() {
            self.client
                .send_photo(destination, thumb, &post.text, &post.button)
                .await
                .map_err(|e| RepostError::send("photo", destination, e))?;
            PostKind::Photo
        } else {
            self.client
                .send_message(destination, &post.text, &post.button, true)
                .await
                .map_err(|e| RepostError::send("text", destination, e))?;
            PostKind::Text
        };

        info!(
            source_chat = message.chat_id,
            source_message = message.message_id,
            archived_id = archived.message_id,
            destination,
            media = message.media.kind(),
            "reposted media"
        );

        Ok(RepostOutcome::Posted {
            archived_id: archived.message_id,
            destination,
            kind,
        })
    }
}
